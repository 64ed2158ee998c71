use crate::context::ProcessingContext;
use crate::error::HandlerError;
use crate::orchestration::{Handler, InvocationResponse};

/// Rejects messages missing any of the required context properties with a
/// client fault.
#[derive(Debug, Clone)]
pub struct ValidationHandler {
    name: String,
    required_properties: Vec<String>,
}

impl ValidationHandler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required_properties: Vec::new(),
        }
    }

    pub fn require(mut self, property: impl Into<String>) -> Self {
        self.required_properties.push(property.into());
        self
    }
}

#[async_trait::async_trait]
impl Handler for ValidationHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        ctx: &mut ProcessingContext,
    ) -> Result<InvocationResponse, HandlerError> {
        let missing: Vec<&str> = self
            .required_properties
            .iter()
            .filter(|key| ctx.property(key).map_or(true, |value| value.is_null()))
            .map(String::as_str)
            .collect();

        if missing.is_empty() {
            Ok(InvocationResponse::Continue)
        } else {
            Err(HandlerError::client(format!(
                "missing required properties: {}",
                missing.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_missing_property_is_client_fault() {
        let handler = ValidationHandler::new("validate").require("customer_id");
        let mut ctx = ProcessingContext::new();

        let err = handler.invoke(&mut ctx).await.unwrap_err();
        assert_eq!(err.fault_code.as_deref(), Some("Client"));
        assert!(err.message.contains("customer_id"));

        ctx.set_property("customer_id", json!(42));
        assert_eq!(
            handler.invoke(&mut ctx).await.unwrap(),
            InvocationResponse::Continue
        );
    }
}
