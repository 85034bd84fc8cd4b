use crate::stack::PlatformStack;
use aws_config::BehaviorVersion;
use eyre::WrapErr;

/// Delete every object so CloudFormation can remove the bucket
///
/// Buckets under a retain policy are never touched.
async fn drain_bucket(client: &aws_sdk_s3::Client, bucket: &str) -> eyre::Result<()> {
    let mut continuation_token = None;

    loop {
        let listing = match client
            .list_objects_v2()
            .bucket(bucket)
            .set_continuation_token(continuation_token.clone())
            .send()
            .await
        {
            Ok(listing) => listing,
            Err(e) => {
                // The stack may have failed before the bucket was created
                log::warn!("Skipping bucket {bucket}: {e:?}");
                return Ok(());
            }
        };

        let objects: Vec<aws_sdk_s3::types::ObjectIdentifier> = listing
            .contents()
            .iter()
            .filter_map(|object| object.key())
            .map(|key| {
                aws_sdk_s3::types::ObjectIdentifier::builder()
                    .key(key)
                    .build()
                    .wrap_err("Failed to build object identifier")
            })
            .collect::<eyre::Result<Vec<_>>>()?;

        if !objects.is_empty() {
            log::info!("Deleting {} objects from {bucket}", objects.len());

            client
                .delete_objects()
                .bucket(bucket)
                .delete(
                    aws_sdk_s3::types::Delete::builder()
                        .set_objects(Some(objects))
                        .build()
                        .wrap_err("Failed to build delete request")?,
                )
                .send()
                .await
                .wrap_err_with(|| format!("Failed to empty bucket {bucket}"))?;
        }

        match listing.next_continuation_token() {
            Some(token) => continuation_token = Some(token.to_string()),
            None => break,
        }
    }

    Ok(())
}

/// Tear the stack down according to each resource's removal policy
pub async fn destroy(stack: &PlatformStack) -> eyre::Result<()> {
    let config = aws_config::defaults(BehaviorVersion::v2025_01_17())
        .region(aws_config::Region::new(stack.region.clone()))
        .load()
        .await;

    let s3 = aws_sdk_s3::Client::new(&config);

    for bucket in stack.buckets_to_drain() {
        drain_bucket(&s3, &bucket).await?;
    }

    let client = aws_sdk_cloudformation::Client::new(&config);

    client
        .delete_stack()
        .stack_name(&stack.name)
        .send()
        .await
        .wrap_err("Failed to delete stack")?;

    Ok(())
}
