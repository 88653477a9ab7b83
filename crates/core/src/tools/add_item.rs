use super::{Tool, ToolError, ToolSpec, non_empty_id, parse_args};
use crate::cart::OrderCart;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

pub struct AddItem;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AddItemArgs {
    #[serde(deserialize_with = "non_empty_id")]
    id: String,
}

#[async_trait]
impl Tool for AddItem {
    fn spec(&self) -> ToolSpec {
        ToolSpec::function(
            "add_item",
            "Add one unit of a menu item to the cart by id.",
            json!({
                "type": "object",
                "properties": { "id": { "type": "string" } },
                "required": ["id"],
                "additionalProperties": false,
            }),
        )
    }

    async fn call(&self, cart: &dyn OrderCart, args: Value) -> Result<Value, ToolError> {
        let args: AddItemArgs = parse_args(args)?;
        info!(id = %args.id, "Executing tool 'add_item'");
        cart.add_item_by_id(&args.id).await?;
        Ok(json!({ "action": "add_item", "id": args.id }))
    }
}
