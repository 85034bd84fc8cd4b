use crate::stack::PlatformStack;
use aws_config::BehaviorVersion;
use eyre::WrapErr;

/// Check if the stack already exists
async fn is_exists(client: &aws_sdk_cloudformation::Client, name: &str) -> eyre::Result<bool> {
    let result = client
        .describe_stacks()
        .set_stack_name(Some(name.into()))
        .send()
        .await;

    if let Err(e) = &result {
        if let aws_sdk_cloudformation::error::SdkError::ServiceError(err) = e {
            if err.err().meta().code() == Some("ValidationError") {
                return Ok(false);
            } else {
                return Err(eyre::eyre!("Service error while describing stack: {err:?}"));
            }
        } else {
            return Err(eyre::eyre!("Failed to describe stack: {e:?}"));
        }
    }

    Ok(true)
}

/// Provision the synthesized plan in CloudFormation
///
/// Composition is already done at this point; this is the single
/// deployment-apply operation, and the applier owns retries of
/// partially-applied state.
pub async fn provision(stack: &PlatformStack) -> eyre::Result<()> {
    let config = aws_config::defaults(BehaviorVersion::v2025_01_17())
        .region(aws_config::Region::new(stack.region.clone()))
        .load()
        .await;

    let client = aws_sdk_cloudformation::Client::new(&config);
    let capabilities = aws_sdk_cloudformation::types::Capability::CapabilityIam;
    let template_body = stack.template_body()?;

    if is_exists(&client, &stack.name).await? {
        log::info!("Updating stack {}", stack.name);

        client
            .update_stack()
            .capabilities(capabilities)
            .stack_name(&stack.name)
            .template_body(template_body)
            .send()
            .await
            .wrap_err("Failed to update stack")?;
    } else {
        log::info!("Creating stack {}", stack.name);

        client
            .create_stack()
            .capabilities(capabilities)
            .stack_name(&stack.name)
            .template_body(template_body)
            .send()
            .await
            .wrap_err("Failed to create stack")?;
    }

    Ok(())
}
