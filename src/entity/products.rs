use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub product_id: i32,
    pub name: String,
    pub price: Decimal,
    pub category_id: i32,
    pub description: Option<String>,
    pub subcategory: Option<String>,
    pub stock: i32,
    pub featured: bool,
    pub image_url: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::shopping_cart::Entity")]
    ShoppingCart,
    #[sea_orm(has_many = "super::order_line_items::Entity")]
    OrderLineItems,
}

impl Related<super::shopping_cart::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ShoppingCart.def()
    }
}

impl Related<super::order_line_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderLineItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
