use serde_json::json;

use super::{CallCatalog, CallDescriptor, CallTable};
use crate::transport::SignatureVersion;

/// Primary AWS calls, run once per region of each service.
fn primary_calls() -> Vec<CallDescriptor> {
    vec![
        CallDescriptor::new("CloudFront", "listDistributions")
            .property("DistributionList")
            .second_property("Items"),
        CallDescriptor::new("CloudTrail", "describeTrails").property("trailList"),
        CallDescriptor::new("ConfigService", "describeConfigurationRecorders").property("ConfigurationRecorders"),
        CallDescriptor::new("ConfigService", "describeConfigurationRecorderStatus")
            .property("ConfigurationRecordersStatus"),
        CallDescriptor::new("EC2", "describeAccountAttributes").property("AccountAttributeSet"),
        CallDescriptor::new("EC2", "describeAddresses").property("AddressesSet"),
        CallDescriptor::new("EC2", "describeInstances")
            .property("ReservationSet")
            .params(json!({
                "Filters": [{
                    "Name": "instance-state-name",
                    "Values": ["pending", "running", "shutting-down", "stopping", "stopped"]
                }]
            })),
        CallDescriptor::new("EC2", "describeSecurityGroups").property("SecurityGroupInfo"),
        CallDescriptor::new("EC2", "describeVpcs").property("VpcSet"),
        CallDescriptor::new("EC2", "describeFlowLogs").property("FlowLogSet"),
        CallDescriptor::new("ELB", "describeLoadBalancers").property("LoadBalancerDescriptions"),
        CallDescriptor::new("IAM", "listServerCertificates").property("ServerCertificateMetadataList"),
        CallDescriptor::new("IAM", "listGroups").property("Groups"),
        CallDescriptor::new("IAM", "listUsers").property("Users"),
        CallDescriptor::new("IAM", "getAccountPasswordPolicy").property("PasswordPolicy"),
        CallDescriptor::new("IAM", "generateCredentialReport").overridden(),
        CallDescriptor::new("KMS", "listKeys").property("Keys"),
        CallDescriptor::new("RDS", "describeDBInstances").property("DBInstances"),
        CallDescriptor::new("RDS", "describeDBClusters").property("DBClusters"),
        CallDescriptor::new("Route53Domains", "listDomains").property("Domains"),
        CallDescriptor::new("S3", "listBuckets").property("Buckets"),
        CallDescriptor::new("SES", "listIdentities")
            .property("Identities")
            .params(json!({"IdentityType": "Domain"}))
            .rate_limit_ms(1000),
    ]
}

fn trail_bucket_call(operation: &str) -> CallDescriptor {
    CallDescriptor::new("S3", operation)
        .depends_on("cloudtrail", "describeTrails")
        .item_filter("S3BucketName", "Bucket")
        .drop_region()
        .signature(SignatureVersion::V4)
}

fn per_user_call(operation: &str) -> CallDescriptor {
    CallDescriptor::new("IAM", operation)
        .depends_on("iam", "listUsers")
        .item_filter("UserName", "UserName")
}

fn per_key_call(operation: &str) -> CallDescriptor {
    CallDescriptor::new("KMS", operation)
        .depends_on("kms", "listKeys")
        .item_filter("KeyId", "KeyId")
}

/// The single postcall wave.
fn postcall_wave() -> Vec<CallDescriptor> {
    vec![
        trail_bucket_call("getBucketLogging"),
        trail_bucket_call("getBucketVersioning"),
        trail_bucket_call("getBucketAcl"),
        CallDescriptor::new("EC2", "describeSubnets")
            .depends_on("ec2", "describeVpcs")
            .overridden(),
        CallDescriptor::new("ELB", "describeLoadBalancerPolicies")
            .depends_on("elb", "describeLoadBalancers")
            .overridden(),
        CallDescriptor::new("IAM", "getGroup")
            .depends_on("iam", "listGroups")
            .item_filter("GroupName", "GroupName"),
        per_user_call("listAttachedUserPolicies"),
        per_user_call("listUserPolicies"),
        per_user_call("listSSHPublicKeys"),
        per_user_call("listMFADevices"),
        per_key_call("describeKey"),
        per_key_call("getKeyRotationStatus"),
        CallDescriptor::new("SES", "getIdentityDkimAttributes")
            .depends_on("ses", "listIdentities")
            .overridden()
            .rate_limit_ms(1000),
    ]
}

/// Built-in AWS call catalog.
pub fn default_catalog() -> CallCatalog {
    CallCatalog {
        primary: CallTable::from_descriptors(primary_calls()),
        waves: vec![CallTable::from_descriptors(postcall_wave())],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_is_valid() {
        let catalog = default_catalog();
        assert!(catalog.validate().is_ok());
        assert_eq!(catalog.primary().len(), 22);
        assert_eq!(catalog.waves().len(), 1);
        assert_eq!(catalog.waves()[0].len(), 13);
    }

    #[test]
    fn test_trail_bucket_calls_drop_region() {
        let catalog = default_catalog();
        let acl = catalog.get("s3", "getBucketAcl").unwrap();
        assert!(acl.drop_region_from_request);
        assert_eq!(acl.signature_override, Some(SignatureVersion::V4));
        assert_eq!(acl.item_filter.as_ref().unwrap().request_field, "Bucket");
    }

    #[test]
    fn test_override_entries() {
        let overrides: Vec<String> = default_catalog()
            .overrides()
            .map(|d| format!("{}:{}", d.service, d.operation))
            .collect();
        assert_eq!(
            overrides,
            vec![
                "IAM:generateCredentialReport",
                "EC2:describeSubnets",
                "ELB:describeLoadBalancerPolicies",
                "SES:getIdentityDkimAttributes",
            ]
        );
    }
}
