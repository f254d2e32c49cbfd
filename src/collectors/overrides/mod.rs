//! Hand-written collectors for catalog entries marked as overrides.
//!
//! These replace the generic invoke-and-extract path where one slot needs
//! several calls (polling, batching) or where results are regrouped before
//! they are stored.

pub mod ec2;
pub mod elb;
pub mod iam;
pub mod ses;

pub use ec2::SubnetsCollector;
pub use elb::LoadBalancerPoliciesCollector;
pub use iam::CredentialReportCollector;
pub use ses::DkimAttributesCollector;
