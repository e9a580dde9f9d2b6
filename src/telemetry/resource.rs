//! Service identity attached to every exported batch.

use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;

use super::error::InitError;

pub const SERVICE_VERSION: &str = "service.version";
pub const DEPLOYMENT_ENVIRONMENT: &str = "deployment.environment";

/// Build the resource, rejecting an empty identity.
pub fn service_resource(
    service_name: &str,
    service_version: &str,
    environment: &str,
) -> Result<Resource, InitError> {
    if service_name.trim().is_empty() {
        return Err(InitError::InvalidResource("service name is empty".into()));
    }
    if service_version.trim().is_empty() {
        return Err(InitError::InvalidResource("service version is empty".into()));
    }

    let mut attributes = vec![KeyValue::new(SERVICE_VERSION, service_version.to_string())];
    if !environment.is_empty() {
        attributes.push(KeyValue::new(DEPLOYMENT_ENVIRONMENT, environment.to_string()));
    }

    Ok(Resource::builder()
        .with_service_name(service_name.to_string())
        .with_attributes(attributes)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::{Key, Value};

    #[test]
    fn test_resource_identity() {
        let resource = service_resource("cart-api", "1.0.0", "test").unwrap();
        assert_eq!(
            resource.get(&Key::from_static_str("service.name")),
            Some(Value::from("cart-api"))
        );
        assert_eq!(
            resource.get(&Key::from_static_str(DEPLOYMENT_ENVIRONMENT)),
            Some(Value::from("test"))
        );
    }

    #[test]
    fn test_empty_identity_rejected() {
        assert!(matches!(
            service_resource(" ", "1.0.0", ""),
            Err(InitError::InvalidResource(_))
        ));
        assert!(matches!(
            service_resource("cart-api", "", ""),
            Err(InitError::InvalidResource(_))
        ));
    }
}
