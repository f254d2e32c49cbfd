use serde_json::Value;

use super::helpers::{as_bool, as_f64, as_str, list, lookup, Lookup};
use super::{Finding, Rule, RuleMetadata, Status};
use crate::cache::Snapshot;
use crate::collectors::overrides::elb::https_policy_names;

pub struct OpenCifs;

static OPEN_CIFS: RuleMetadata = RuleMetadata {
    title: "Open CIFS",
    category: "EC2",
    description: "Determine if UDP port 445 for CIFS is open to the public",
    more_info: "While some ports such as HTTP and HTTPS are required to be open to the public to function properly, more sensitive services such as CIFS should be restricted to known IP addresses.",
    link: "http://docs.aws.amazon.com/AWSEC2/latest/UserGuide/authorizing-access-to-an-instance.html",
    recommended_action: "Restrict UDP port 445 to known IP addresses",
    apis: &["EC2:describeSecurityGroups"],
};

/// Publicly reachable ports checked, per protocol.
const CIFS_PORTS: &[(&str, &[u16])] = &[("udp", &[445])];

fn permission_covers(permission: &Value, port: u16) -> bool {
    let from = permission.get("FromPort").and_then(as_f64);
    let to = permission.get("ToPort").and_then(as_f64);
    matches!((from, to), (Some(from), Some(to)) if from <= f64::from(port) && to >= f64::from(port))
}

impl Rule for OpenCifs {
    fn metadata(&self) -> &'static RuleMetadata {
        &OPEN_CIFS
    }

    fn evaluate(&self, snapshot: &Snapshot) -> Vec<Finding> {
        let mut findings = Vec::new();
        for region in snapshot.regions("ec2", "describeSecurityGroups") {
            let groups = match lookup(snapshot.get("ec2", "describeSecurityGroups", region)) {
                Lookup::Missing => continue,
                Lookup::Data(Value::Array(groups)) => groups,
                state => {
                    let detail = match state {
                        Lookup::Failed(Some(error)) => error,
                        _ => "Unknown error",
                    };
                    findings.push(
                        Finding::new(Status::Unknown, format!("Unable to query for security groups: {}", detail))
                            .in_region(region),
                    );
                    continue;
                }
            };
            if groups.is_empty() {
                findings.push(Finding::new(Status::Ok, "No security groups present").in_region(region));
                continue;
            }

            let mut found = false;
            for group in groups {
                for permission in list(group, "IpPermissions") {
                    let protocol = as_str(permission, "IpProtocol").unwrap_or_default();
                    let Some((_, ports)) = CIFS_PORTS.iter().find(|(p, _)| *p == protocol) else {
                        continue;
                    };
                    for range in list(permission, "IpRanges") {
                        if as_str(range, "CidrIp") != Some("0.0.0.0/0") {
                            continue;
                        }
                        for port in ports.iter().copied().filter(|port| permission_covers(permission, *port)) {
                            found = true;
                            let group_id = as_str(group, "GroupId").unwrap_or_default();
                            let resource = format!(
                                "arn:aws:ec2:{}:{}:security-group/{}",
                                region,
                                as_str(group, "OwnerId").unwrap_or_default(),
                                group_id
                            );
                            findings.push(
                                Finding::new(
                                    Status::Fail,
                                    format!(
                                        "Security group: {} ({}) has CIFS {} port {} open to 0.0.0.0/0",
                                        group_id,
                                        as_str(group, "GroupName").unwrap_or_default(),
                                        protocol.to_uppercase(),
                                        port
                                    ),
                                )
                                .in_region(region)
                                .for_resource(resource),
                            );
                        }
                    }
                }
            }

            if !found {
                findings.push(Finding::new(Status::Ok, "No public open ports found").in_region(region));
            }
        }
        findings
    }
}

pub struct ElasticIpLimit;

static ELASTIC_IP_LIMIT: RuleMetadata = RuleMetadata {
    title: "Elastic IP Limit",
    category: "EC2",
    description: "Determine if the number of allocated EIPs is close to the AWS per-account limit",
    more_info: "AWS limits accounts to certain numbers of resources. Exceeding those limits could prevent resources from launching.",
    link: "http://docs.aws.amazon.com/AWSEC2/latest/UserGuide/elastic-ip-addresses-eip.html#using-instance-addressing-limit",
    recommended_action: "Contact AWS support to increase the number of EIPs available",
    apis: &["EC2:describeAccountAttributes", "EC2:describeAddresses"],
};

const DEFAULT_EIP_LIMIT: f64 = 5.0;

/// `max-elastic-ips` from the account attributes, if reported.
fn elastic_ip_limit(attributes: &[Value]) -> Option<f64> {
    let attribute = attributes
        .iter()
        .find(|attribute| as_str(attribute, "AttributeName") == Some("max-elastic-ips"))?;
    let values = match attribute.get("AttributeValues") {
        Some(Value::Array(values)) => values.as_slice(),
        _ => list(attribute, "AttributeValueSet"),
    };
    values.first()?.get("AttributeValue").and_then(as_f64)
}

impl Rule for ElasticIpLimit {
    fn metadata(&self) -> &'static RuleMetadata {
        &ELASTIC_IP_LIMIT
    }

    fn evaluate(&self, snapshot: &Snapshot) -> Vec<Finding> {
        let mut findings = Vec::new();
        for region in snapshot.regions("ec2", "describeAccountAttributes") {
            let attributes = match lookup(snapshot.get("ec2", "describeAccountAttributes", region)) {
                Lookup::Missing => continue,
                Lookup::Data(Value::Array(attributes)) => attributes.as_slice(),
                _ => {
                    findings.push(Finding::new(Status::Unknown, "Unable to query for account limits").in_region(region));
                    continue;
                }
            };
            let limit = elastic_ip_limit(attributes).unwrap_or(DEFAULT_EIP_LIMIT);

            let addresses = match lookup(snapshot.get("ec2", "describeAddresses", region)) {
                Lookup::Missing => continue,
                Lookup::Data(Value::Array(addresses)) => addresses,
                _ => {
                    findings.push(
                        Finding::new(Status::Unknown, "Unable to describe addresses for Elastic IP limit").in_region(region),
                    );
                    continue;
                }
            };

            let eips = addresses
                .iter()
                .filter(|address| as_str(address, "Domain") != Some("vpc"))
                .count() as f64;
            if eips == 0.0 {
                findings.push(Finding::new(Status::Ok, "No Elastic IPs found").in_region(region));
                continue;
            }

            let message = format!("Account contains {} of {} available Elastic IPs", eips, limit);
            let status = if eips >= limit {
                Status::Fail
            } else if eips == limit - 1.0 {
                Status::Warn
            } else {
                Status::Ok
            };
            findings.push(Finding::new(status, message).in_region(region));
        }
        findings
    }
}

pub struct InsecureCiphers;

static INSECURE_CIPHERS: RuleMetadata = RuleMetadata {
    title: "Insecure Ciphers",
    category: "EC2",
    description: "Detect use of insecure ciphers on ELBs",
    more_info: "Various security vulnerabilities have rendered several ciphers insecure. Only the recommended ciphers should be used.",
    link: "http://docs.aws.amazon.com/ElasticLoadBalancing/latest/DeveloperGuide/elb-security-policy-options.html",
    recommended_action: "Update your ELBs to use the recommended cipher suites",
    apis: &["ELB:describeLoadBalancers", "ELB:describeLoadBalancerPolicies"],
};

const BAD_CIPHERS: &[&str] = &[
    "Protocol-SSLv2", "Protocol-SSLv3", "DHE-RSA-AES128-SHA", "DHE-DSS-AES128-SHA", "CAMELLIA128-SHA",
    "EDH-RSA-DES-CBC3-SHA", "ECDHE-RSA-RC4-SHA", "RC4-SHA", "ECDHE-ECDSA-RC4-SHA",
    "DHE-DSS-AES256-GCM-SHA384", "DHE-RSA-AES256-GCM-SHA384", "DHE-RSA-AES256-SHA256",
    "DHE-DSS-AES256-SHA256", "DHE-RSA-AES256-SHA", "DHE-DSS-AES256-SHA", "DHE-RSA-CAMELLIA256-SHA",
    "DHE-DSS-CAMELLIA256-SHA", "CAMELLIA256-SHA", "EDH-DSS-DES-CBC3-SHA", "DHE-DSS-AES128-GCM-SHA256",
    "DHE-RSA-AES128-GCM-SHA256", "DHE-RSA-AES128-SHA256", "DHE-DSS-AES128-SHA256",
    "DHE-RSA-CAMELLIA128-SHA", "DHE-DSS-CAMELLIA128-SHA", "ADH-AES128-GCM-SHA256", "ADH-AES128-SHA",
    "ADH-AES128-SHA256", "ADH-AES256-GCM-SHA384", "ADH-AES256-SHA", "ADH-AES256-SHA256",
    "ADH-CAMELLIA128-SHA", "ADH-CAMELLIA256-SHA", "ADH-DES-CBC3-SHA", "ADH-DES-CBC-SHA", "ADH-RC4-MD5",
    "ADH-SEED-SHA", "DES-CBC-SHA", "DHE-DSS-SEED-SHA", "DHE-RSA-SEED-SHA", "EDH-DSS-DES-CBC-SHA",
    "EDH-RSA-DES-CBC-SHA", "IDEA-CBC-SHA", "RC4-MD5", "SEED-SHA", "DES-CBC3-MD5", "DES-CBC-MD5",
    "RC2-CBC-MD5", "PSK-AES256-CBC-SHA", "PSK-3DES-EDE-CBC-SHA", "KRB5-DES-CBC3-SHA", "KRB5-DES-CBC3-MD5",
    "PSK-AES128-CBC-SHA", "PSK-RC4-SHA", "KRB5-RC4-SHA", "KRB5-RC4-MD5", "KRB5-DES-CBC-SHA",
    "KRB5-DES-CBC-MD5", "EXP-EDH-RSA-DES-CBC-SHA", "EXP-EDH-DSS-DES-CBC-SHA", "EXP-ADH-DES-CBC-SHA",
    "EXP-DES-CBC-SHA", "EXP-RC2-CBC-MD5", "EXP-KRB5-RC2-CBC-SHA", "EXP-KRB5-DES-CBC-SHA",
    "EXP-KRB5-RC2-CBC-MD5", "EXP-KRB5-DES-CBC-MD5", "EXP-ADH-RC4-MD5", "EXP-RC4-MD5", "EXP-KRB5-RC4-SHA",
    "EXP-KRB5-RC4-MD5",
];

/// Enabled insecure protocols and ciphers of one policy description.
fn insecure_attributes(policy: &Value) -> Vec<&str> {
    list(policy, "PolicyAttributeDescriptions")
        .iter()
        .filter(|attribute| as_bool(attribute.get("AttributeValue")))
        .filter_map(|attribute| as_str(attribute, "AttributeName"))
        .filter(|name| BAD_CIPHERS.iter().any(|bad| bad == name))
        .collect()
}

impl Rule for InsecureCiphers {
    fn metadata(&self) -> &'static RuleMetadata {
        &INSECURE_CIPHERS
    }

    fn evaluate(&self, snapshot: &Snapshot) -> Vec<Finding> {
        let mut findings = Vec::new();
        for region in snapshot.regions("elb", "describeLoadBalancers") {
            let load_balancers = match lookup(snapshot.get("elb", "describeLoadBalancers", region)) {
                Lookup::Missing => continue,
                Lookup::Data(Value::Array(load_balancers)) => load_balancers,
                _ => {
                    findings.push(Finding::new(Status::Unknown, "Unable to query for load balancers").in_region(region));
                    continue;
                }
            };

            let https: Vec<&Value> = load_balancers
                .iter()
                .filter(|lb| !https_policy_names(lb).is_empty())
                .collect();
            if https.is_empty() {
                findings.push(Finding::new(Status::Ok, "No load balancers are using HTTPS").in_region(region));
                continue;
            }

            for load_balancer in https {
                let name = as_str(load_balancer, "LoadBalancerName").unwrap_or_default();
                let dns = as_str(load_balancer, "DNSName").unwrap_or(name);

                let policies = match lookup(snapshot.get_item("elb", "describeLoadBalancerPolicies", region, name)) {
                    Lookup::Data(Value::Array(policies)) => policies,
                    _ => {
                        findings.push(
                            Finding::new(
                                Status::Unknown,
                                format!("Unable to query load balancer policies for ELB: {}", name),
                            )
                            .in_region(region)
                            .for_resource(dns),
                        );
                        continue;
                    }
                };

                for policy in policies {
                    let bad = insecure_attributes(policy);
                    let finding = if bad.is_empty() {
                        Finding::new(Status::Ok, format!("ELB: {} uses secure protocols and ciphers", name))
                    } else {
                        Finding::new(
                            Status::Warn,
                            format!("ELB: {} uses insecure protocols or ciphers: {}", name, bad.join(", ")),
                        )
                    };
                    findings.push(finding.in_region(region).for_resource(dns));
                }
            }
        }
        findings
    }
}
