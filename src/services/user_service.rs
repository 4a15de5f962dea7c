use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};

use crate::{
    entity::users::{Column as UserCol, Entity as Users, Model as UserModel},
    error::{AppError, AppResult},
    models::User,
};

/// Resolves a principal's username to the stored user.
pub async fn get_by_username<C: ConnectionTrait>(conn: &C, username: &str) -> AppResult<User> {
    Users::find()
        .filter(UserCol::Username.eq(username))
        .one(conn)
        .await?
        .map(user_from_entity)
        .ok_or_else(|| AppError::not_found("User not found"))
}

fn user_from_entity(model: UserModel) -> User {
    User {
        id: model.user_id,
        username: model.username,
    }
}
