use mongodb::{
    Database,
    bson::{doc, oid::ObjectId},
};
use rocket::{State, futures::TryStreamExt, get, routes, serde::json::Json};

use crate::errors::ApiError;
use crate::models::User;
use crate::schemas::Schema;

pub(crate) fn parse_oid(id: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(id).map_err(|_| ApiError::BadRequest(format!("'{id}' is not a valid id")))
}

#[get("/")]
pub async fn get_users(db: &State<Database>) -> Result<Json<Vec<User>>, ApiError> {
    let collection = db.collection::<User>(Schema::Users.entity());

    let users: Vec<User> = collection
        .find(doc! {})
        .sort(doc! { "name": 1 })
        .await?
        .try_collect()
        .await?;

    Ok(Json(users))
}

#[get("/<user_id>")]
pub async fn get_user(db: &State<Database>, user_id: &str) -> Result<Json<User>, ApiError> {
    let collection = db.collection::<User>(Schema::Users.entity());
    let oid = parse_oid(user_id)?;

    let user = collection
        .find_one(doc! { "_id": oid })
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {user_id} not found")))?;

    Ok(Json(user))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![get_users, get_user]
}
