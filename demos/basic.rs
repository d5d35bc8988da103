use std::time::Duration;

use requester::{
    request_option::{with_header, with_retry_policy, with_url_query},
    response_option::{with_status_code_assertion, with_unmarshal_json},
    BackoffPolicy, Client, Context,
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct Item {
    id: u64,
    name: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let client = Client::from_env().map_err(anyhow::Error::msg)?;
    let ctx = Context::background().with_timeout(Duration::from_secs(30));

    let mut items: Vec<Item> = Vec::new();
    client
        .get(&ctx, &["items"])
        .send(vec![
            with_header("Accept", "application/json"),
            with_url_query([("limit", 10)]),
            with_retry_policy(
                3,
                Duration::from_millis(250),
                BackoffPolicy::Exponential,
                [502, 503, 504],
            ),
        ])
        .await
        .handle(vec![
            with_status_code_assertion([200]),
            with_unmarshal_json(&mut items, [200]),
        ])?;

    for item in items {
        println!("{}: {}", item.id, item.name);
    }

    Ok(())
}
