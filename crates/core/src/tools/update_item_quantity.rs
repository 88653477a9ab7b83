use super::{Tool, ToolError, ToolSpec, non_empty_id, non_negative_quantity, parse_args};
use crate::cart::OrderCart;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

/// Sets the quantity of a cart line. Zero removes the line; that rule lives
/// in the cart, not here.
pub struct UpdateItemQuantity;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateItemQuantityArgs {
    #[serde(deserialize_with = "non_empty_id")]
    id: String,
    #[serde(deserialize_with = "non_negative_quantity")]
    quantity: u32,
}

#[async_trait]
impl Tool for UpdateItemQuantity {
    fn spec(&self) -> ToolSpec {
        ToolSpec::function(
            "update_item_quantity",
            "Set item quantity in the cart (0 to remove).",
            json!({
                "type": "object",
                "properties": {
                    "id": { "type": "string" },
                    "quantity": { "type": "integer", "minimum": 0 },
                },
                "required": ["id", "quantity"],
                "additionalProperties": false,
            }),
        )
    }

    async fn call(&self, cart: &dyn OrderCart, args: Value) -> Result<Value, ToolError> {
        let args: UpdateItemQuantityArgs = parse_args(args)?;
        info!(id = %args.id, quantity = args.quantity, "Executing tool 'update_item_quantity'");
        cart.update_item_quantity(&args.id, args.quantity).await?;
        Ok(json!({
            "action": "update_item_quantity",
            "id": args.id,
            "quantity": args.quantity,
        }))
    }
}
