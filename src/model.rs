//! Shop entities and the static table metadata the SQL builder works from.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    BigInt,
    Bool,
}

#[derive(Clone, Copy, Debug)]
pub struct ColumnDef {
    pub name: &'static str,
    pub type_: ColumnType,
    pub nullable: bool,
}

const fn col(name: &'static str, type_: ColumnType) -> ColumnDef {
    ColumnDef {
        name,
        type_,
        nullable: false,
    }
}

const fn nullable(name: &'static str, type_: ColumnType) -> ColumnDef {
    ColumnDef {
        name,
        type_,
        nullable: true,
    }
}

/// Table name, primary key and column list for one entity collection.
#[derive(Debug)]
pub struct EntityModel {
    pub entity: &'static str,
    pub table: &'static str,
    pub pk: &'static str,
    pub columns: &'static [ColumnDef],
}

impl EntityModel {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }
}

pub const CATEGORIES: EntityModel = EntityModel {
    entity: "category",
    table: "categories",
    pk: "id",
    columns: &[
        col("id", ColumnType::Text),
        col("name", ColumnType::Text),
        nullable("description", ColumnType::Text),
    ],
};

pub const PRODUCTS: EntityModel = EntityModel {
    entity: "product",
    table: "products",
    pk: "id",
    columns: &[
        col("id", ColumnType::Text),
        col("category_id", ColumnType::Text),
        col("name", ColumnType::Text),
        nullable("description", ColumnType::Text),
        col("price_cents", ColumnType::BigInt),
        col("stock", ColumnType::BigInt),
    ],
};

pub const USERS: EntityModel = EntityModel {
    entity: "user",
    table: "users",
    pk: "id",
    columns: &[
        col("id", ColumnType::Text),
        col("email", ColumnType::Text),
        col("display_name", ColumnType::Text),
        col("password_hash", ColumnType::Text),
        col("is_admin", ColumnType::Bool),
    ],
};

pub const ORDERS: EntityModel = EntityModel {
    entity: "order",
    table: "orders",
    pk: "id",
    columns: &[
        col("id", ColumnType::Text),
        col("user_id", ColumnType::Text),
        col("product_id", ColumnType::Text),
        col("quantity", ColumnType::BigInt),
        col("total_cents", ColumnType::BigInt),
        col("status", ColumnType::Text),
        col("created_at", ColumnType::Text),
    ],
};

/// A row type stored in one of the context's collections.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    const MODEL: &'static EntityModel;

    fn id(&self) -> &str;
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Category {
            id: new_id(),
            name: name.into(),
            description: None,
        }
    }
}

impl Entity for Category {
    const MODEL: &'static EntityModel = &CATEGORIES;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub category_id: String,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub stock: i64,
}

impl Product {
    pub fn new(category_id: impl Into<String>, name: impl Into<String>, price_cents: i64) -> Self {
        Product {
            id: new_id(),
            category_id: category_id.into(),
            name: name.into(),
            description: None,
            price_cents,
            stock: 0,
        }
    }
}

impl Entity for Product {
    const MODEL: &'static EntityModel = &PRODUCTS;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub is_admin: bool,
}

impl User {
    pub fn new(email: impl Into<String>, display_name: impl Into<String>, password_hash: impl Into<String>) -> Self {
        User {
            id: new_id(),
            email: email.into(),
            display_name: display_name.into(),
            password_hash: password_hash.into(),
            is_admin: false,
        }
    }
}

impl Entity for User {
    const MODEL: &'static EntityModel = &USERS;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub total_cents: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// New pending order; total is `quantity * unit_price_cents`.
    pub fn new(user_id: impl Into<String>, product: &Product, quantity: i64) -> Self {
        Order {
            id: new_id(),
            user_id: user_id.into(),
            product_id: product.id.clone(),
            quantity,
            total_cents: quantity * product.price_cents,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

impl Entity for Order {
    const MODEL: &'static EntityModel = &ORDERS;

    fn id(&self) -> &str {
        &self.id
    }
}
