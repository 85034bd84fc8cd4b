use aws_config::BehaviorVersion;
use eyre::WrapErr;

/// One line of stack history
#[derive(Clone, Debug)]
pub struct StackEvent {
    pub logical_id: String,
    pub resource_type: String,
    pub status: String,
    pub reason: Option<String>,
    pub timestamp: String,
}

async fn client(region: &str) -> aws_sdk_cloudformation::Client {
    let config = aws_config::defaults(BehaviorVersion::v2025_01_17())
        .region(aws_config::Region::new(region.to_string()))
        .load()
        .await;

    aws_sdk_cloudformation::Client::new(&config)
}

/// Current stack status, None when the stack does not exist
pub async fn current(name: &str, region: &str) -> eyre::Result<Option<String>> {
    let client = client(region).await;

    let result = client
        .describe_stacks()
        .set_stack_name(Some(name.to_string()))
        .send()
        .await;

    match result {
        Ok(output) => Ok(output
            .stacks()
            .first()
            .and_then(|s| s.stack_status())
            .map(|s| s.as_str().to_string())),
        Err(e) => {
            if let aws_sdk_cloudformation::error::SdkError::ServiceError(err) = &e {
                if err.err().meta().code() == Some("ValidationError") {
                    return Ok(None);
                }
            }

            Err(eyre::eyre!("Failed to describe stack: {e:?}"))
        }
    }
}

/// Recent stack events, newest first
pub async fn events(name: &str, region: &str, limit: usize) -> eyre::Result<Vec<StackEvent>> {
    let client = client(region).await;
    let mut next_token = None;
    let mut collected = Vec::new();

    loop {
        let page = client
            .describe_stack_events()
            .stack_name(name)
            .set_next_token(next_token.clone())
            .send()
            .await
            .wrap_err("Failed to describe stack events")?;

        for event in page.stack_events() {
            collected.push(StackEvent {
                logical_id: event.logical_resource_id().unwrap_or_default().to_string(),
                resource_type: event.resource_type().unwrap_or_default().to_string(),
                status: event
                    .resource_status()
                    .map(|s| s.as_str().to_string())
                    .unwrap_or_default(),
                reason: event.resource_status_reason().map(str::to_string),
                timestamp: event.timestamp().map(|t| t.to_string()).unwrap_or_default(),
            });

            if collected.len() >= limit {
                return Ok(collected);
            }
        }

        match page.next_token() {
            Some(token) => next_token = Some(token.to_string()),
            None => break,
        }
    }

    Ok(collected)
}
