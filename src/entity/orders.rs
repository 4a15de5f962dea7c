use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub order_id: i32,
    pub user_id: i32,
    pub date: DateTimeWithTimeZone,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub shipping_amount: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::UserId"
    )]
    Users,
    #[sea_orm(has_many = "super::order_line_items::Entity")]
    OrderLineItems,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::order_line_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderLineItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
