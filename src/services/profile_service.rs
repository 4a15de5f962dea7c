use sea_orm::{ConnectionTrait, EntityTrait, Set, sea_query::OnConflict};

use crate::{
    dto::profile::UpdateProfileRequest,
    entity::profiles::{
        ActiveModel as ProfileActive, Column as ProfileCol, Entity as Profiles,
        Model as ProfileModel,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Profile,
    response::{ApiResponse, Meta},
    services::user_service,
    state::AppState,
};

pub async fn get_by_user_id<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
) -> AppResult<Option<Profile>> {
    let profile = Profiles::find_by_id(user_id).one(conn).await?;
    Ok(profile.map(profile_from_entity))
}

pub async fn find_profile<C: ConnectionTrait>(conn: &C, user_id: i32) -> AppResult<Profile> {
    get_by_user_id(conn, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Profile not found"))
}

/// Creates or replaces the profile of `user_id`.
pub async fn update<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    payload: UpdateProfileRequest,
) -> AppResult<Profile> {
    validate(&payload)?;

    let UpdateProfileRequest {
        first_name,
        last_name,
        phone,
        email,
        address,
        city,
        state,
        zip,
    } = payload;

    let profile = ProfileActive {
        user_id: Set(user_id),
        first_name: Set(first_name),
        last_name: Set(last_name),
        phone: Set(phone),
        email: Set(email),
        address: Set(address.trim().to_string()),
        city: Set(city.trim().to_string()),
        state: Set(state.trim().to_uppercase()),
        zip: Set(zip.trim().to_string()),
    };

    Profiles::insert(profile)
        .on_conflict(
            OnConflict::column(ProfileCol::UserId)
                .update_columns([
                    ProfileCol::FirstName,
                    ProfileCol::LastName,
                    ProfileCol::Phone,
                    ProfileCol::Email,
                    ProfileCol::Address,
                    ProfileCol::City,
                    ProfileCol::State,
                    ProfileCol::Zip,
                ])
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;

    get_by_user_id(conn, user_id)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("profile missing after upsert")))
}

fn validate(payload: &UpdateProfileRequest) -> AppResult<()> {
    let required = [
        ("address", &payload.address),
        ("city", &payload.city),
        ("state", &payload.state),
        ("zip", &payload.zip),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(AppError::bad_request(format!("{field} is required")));
        }
    }
    if payload.state.trim().chars().count() != 2 {
        return Err(AppError::bad_request(
            "state must be a two-letter code".to_string(),
        ));
    }
    Ok(())
}

pub async fn get_profile(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Profile>> {
    let owner = user_service::get_by_username(state.db(), &user.username).await?;
    let profile = find_profile(state.db(), owner.id).await?;

    Ok(ApiResponse::success("OK", profile, Some(Meta::empty())))
}

pub async fn update_profile(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<Profile>> {
    let owner = user_service::get_by_username(state.db(), &user.username).await?;
    let profile = update(state.db(), owner.id, payload).await?;

    crate::audit::record(
        state.db(),
        owner.id,
        "profile_update",
        "profiles",
        serde_json::json!({ "user_id": owner.id }),
    )
    .await;

    Ok(ApiResponse::success("Profile updated", profile, Some(Meta::empty())))
}

fn profile_from_entity(model: ProfileModel) -> Profile {
    Profile {
        user_id: model.user_id,
        first_name: model.first_name,
        last_name: model.last_name,
        phone: model.phone,
        email: model.email,
        address: model.address,
        city: model.city,
        state: model.state,
        zip: model.zip,
    }
}
