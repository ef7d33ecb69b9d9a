use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "employee_id": "E1",
        "name": "Alice"
    })
)]
pub struct Employee {
    /// internal row id
    #[schema(example = 1)]
    pub id: u64,

    /// stable external identifier, unique
    #[schema(example = "E1")]
    pub employee_id: String,

    #[schema(example = "Alice")]
    pub name: String,
}
