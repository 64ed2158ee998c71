use crate::context::ProcessingContext;
use crate::error::HandlerError;
use crate::orchestration::{Handler, InvocationResponse};
use std::collections::HashSet;

/// Claims a fixed set of extension headers by marking them processed
#[derive(Debug, Clone)]
pub struct HeaderProcessingHandler {
    name: String,
    headers: HashSet<String>,
}

impl HeaderProcessingHandler {
    pub fn new(name: impl Into<String>, headers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            headers: headers.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait::async_trait]
impl Handler for HeaderProcessingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        ctx: &mut ProcessingContext,
    ) -> Result<InvocationResponse, HandlerError> {
        for header in ctx.headers.iter_mut() {
            if self.headers.contains(&header.name) {
                header.processed = true;
            }
        }
        Ok(InvocationResponse::Continue)
    }
}
