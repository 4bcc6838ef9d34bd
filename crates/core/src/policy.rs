//! IAM policy documents for the execution role and the monitoring meta-role.

use serde_json::{json, Value};

pub const POLICY_VERSION: &str = "2012-10-17";

/// Service principal the function runs under.
pub const LAMBDA_SERVICE_PRINCIPAL: &str = "lambda.amazonaws.com";

/// Service principal of the schedule trigger.
pub const EVENTS_SERVICE_PRINCIPAL: &str = "events.amazonaws.com";

/// Logging only. Nothing else is granted to the function.
pub const EXECUTION_LOG_ACTIONS: &[&str] = &[
    "logs:CreateLogGroup",
    "logs:CreateLogStream",
    "logs:PutLogEvents",
];

/// Network interface management Lambda needs to attach to a VPC.
pub const VPC_ACCESS_ACTIONS: &[&str] = &[
    "ec2:CreateNetworkInterface",
    "ec2:DescribeNetworkInterfaces",
    "ec2:DeleteNetworkInterface",
];

/// Read-only metrics and logs access for the monitoring principal.
pub const META_ROLE_ACTIONS: &[&str] = &[
    "cloudwatch:Describe*",
    "cloudwatch:Get*",
    "cloudwatch:List*",
    "logs:Get*",
    "logs:List*",
    "logs:Describe*",
    "logs:TestMetricFilter",
    "logs:FilterLogEvents",
];

/// Trust policy letting an AWS service assume the role.
pub fn service_trust_policy(service: &str) -> Value {
    json!({
        "Version": POLICY_VERSION,
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": service },
            "Action": "sts:AssumeRole",
        }],
    })
}

/// Trust policy letting another account's root principal assume the role.
pub fn account_trust_policy(account_id: &str) -> Value {
    json!({
        "Version": POLICY_VERSION,
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "AWS": format!("arn:aws:iam::{account_id}:root") },
            "Action": "sts:AssumeRole",
        }],
    })
}

fn allow_all_resources(actions: &[&str]) -> Value {
    json!({
        "Effect": "Allow",
        "Action": actions,
        "Resource": "*",
    })
}

/// Permissions for the function's execution role.
pub fn execution_role_policy(vpc_attached: bool) -> Value {
    let mut statements = vec![allow_all_resources(EXECUTION_LOG_ACTIONS)];
    if vpc_attached {
        statements.push(allow_all_resources(VPC_ACCESS_ACTIONS));
    }
    json!({
        "Version": POLICY_VERSION,
        "Statement": statements,
    })
}

pub fn meta_role_policy() -> Value {
    json!({
        "Version": POLICY_VERSION,
        "Statement": [allow_all_resources(META_ROLE_ACTIONS)],
    })
}

/// Collect every action a policy document allows, for assertions and logs.
pub fn allowed_actions(policy: &Value) -> Vec<String> {
    policy["Statement"]
        .as_array()
        .into_iter()
        .flatten()
        .filter(|s| s["Effect"] == "Allow")
        .flat_map(|s| match &s["Action"] {
            Value::String(a) => vec![a.clone()],
            Value::Array(items) => items
                .iter()
                .filter_map(|a| a.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        })
        .collect()
}
