use super::ProviderError;

/// Wire protocol spoken by a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// `awsJson1.1`: JSON body, operation named by the `X-Amz-Target` header.
    Json { target_prefix: &'static str },
    /// Form-encoded `Action`/`Version` body, XML response.
    Query { version: &'static str },
    /// Plain HTTP verbs on resource paths, XML response.
    RestXml,
    /// Served by the typed S3 client.
    S3,
}

/// How to reach one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub signing_name: &'static str,
    host_prefix: &'static str,
    /// Services with a single global endpoint are always signed for this region.
    global_region: Option<&'static str>,
    pub protocol: Protocol,
}

impl Endpoint {
    /// Look up the endpoint of a catalog service name (case-insensitive).
    pub fn for_service(service: &str) -> Result<Self, ProviderError> {
        let endpoint = match service.to_lowercase().as_str() {
            "cloudtrail" => Self::regional("cloudtrail", Protocol::Json {
                target_prefix: "com.amazonaws.cloudtrail.v20131101.CloudTrail_20131101",
            }),
            "kms" => Self::regional("kms", Protocol::Json { target_prefix: "TrentService" }),
            "configservice" => Self {
                host_prefix: "config",
                ..Self::regional("config", Protocol::Json { target_prefix: "StarlingDoveService" })
            },
            "route53domains" => Self::regional("route53domains", Protocol::Json {
                target_prefix: "Route53Domains_v20140515",
            }),
            "ec2" => Self::regional("ec2", Protocol::Query { version: "2016-11-15" }),
            "elb" => Self {
                host_prefix: "elasticloadbalancing",
                ..Self::regional("elasticloadbalancing", Protocol::Query { version: "2012-06-01" })
            },
            "rds" => Self::regional("rds", Protocol::Query { version: "2014-10-31" }),
            "ses" => Self {
                host_prefix: "email",
                ..Self::regional("ses", Protocol::Query { version: "2010-12-01" })
            },
            "iam" => Self::global("iam", Protocol::Query { version: "2010-05-08" }),
            "cloudfront" => Self::global("cloudfront", Protocol::RestXml),
            "s3" => Self::regional("s3", Protocol::S3),
            other => return Err(ProviderError::Unsupported(format!("No endpoint known for service '{}'", other))),
        };
        Ok(endpoint)
    }

    fn regional(name: &'static str, protocol: Protocol) -> Self {
        Self { signing_name: name, host_prefix: name, global_region: None, protocol }
    }

    fn global(name: &'static str, protocol: Protocol) -> Self {
        Self { signing_name: name, host_prefix: name, global_region: Some("us-east-1"), protocol }
    }

    /// Region the request is signed for.
    pub fn signing_region<'a>(&self, region: &'a str) -> &'a str {
        self.global_region.unwrap_or(region)
    }

    pub fn hostname(&self, region: &str) -> String {
        match self.global_region {
            Some(_) => format!("{}.amazonaws.com", self.host_prefix),
            None if region.starts_with("cn-") => format!("{}.{}.amazonaws.com.cn", self.host_prefix, region),
            None => format!("{}.{}.amazonaws.com", self.host_prefix, region),
        }
    }
}
