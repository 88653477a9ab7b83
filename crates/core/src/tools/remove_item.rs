use super::{Tool, ToolError, ToolSpec, non_empty_id, parse_args};
use crate::cart::OrderCart;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

pub struct RemoveItem;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RemoveItemArgs {
    #[serde(deserialize_with = "non_empty_id")]
    id: String,
}

#[async_trait]
impl Tool for RemoveItem {
    fn spec(&self) -> ToolSpec {
        ToolSpec::function(
            "remove_item",
            "Remove an item from the cart by id.",
            json!({
                "type": "object",
                "properties": { "id": { "type": "string" } },
                "required": ["id"],
                "additionalProperties": false,
            }),
        )
    }

    async fn call(&self, cart: &dyn OrderCart, args: Value) -> Result<Value, ToolError> {
        let args: RemoveItemArgs = parse_args(args)?;
        info!(id = %args.id, "Executing tool 'remove_item'");
        cart.remove_item_by_id(&args.id).await?;
        Ok(json!({ "action": "remove_item", "id": args.id }))
    }
}
