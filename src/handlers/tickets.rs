use mongodb::{
    Database,
    bson::{Document, doc},
};
use rocket::{State, futures::TryStreamExt, get, routes, serde::json::Json};

use crate::errors::ApiError;
use crate::handlers::users::parse_oid;
use crate::models::{Ticket, TicketStatus};
use crate::schemas::Schema;

fn status_filter(status: Option<&str>) -> Result<Document, ApiError> {
    match status {
        None => Ok(doc! {}),
        Some(value) => {
            let status = TicketStatus::parse(value).ok_or_else(|| {
                ApiError::BadRequest(format!(
                    "unknown ticket status '{value}', expected open, in_progress or closed"
                ))
            })?;
            Ok(doc! { "status": status.as_str() })
        }
    }
}

#[get("/?<status>")]
pub async fn get_tickets(
    db: &State<Database>,
    status: Option<&str>,
) -> Result<Json<Vec<Ticket>>, ApiError> {
    let collection = db.collection::<Ticket>(Schema::Tickets.entity());
    let filter = status_filter(status)?;

    let mut cursor = collection
        .find(filter)
        .sort(doc! { "created_at": -1 })
        .await?;

    let mut tickets = Vec::new();
    while let Some(ticket) = cursor.try_next().await? {
        tickets.push(ticket);
    }

    Ok(Json(tickets))
}

#[get("/<ticket_id>")]
pub async fn get_ticket(db: &State<Database>, ticket_id: &str) -> Result<Json<Ticket>, ApiError> {
    let collection = db.collection::<Ticket>(Schema::Tickets.entity());
    let oid = parse_oid(ticket_id)?;

    let ticket = collection
        .find_one(doc! { "_id": oid })
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("ticket {ticket_id} not found")))?;

    Ok(Json(ticket))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![get_tickets, get_ticket]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_filter_accepts_known_statuses() {
        assert_eq!(status_filter(None).unwrap(), doc! {});
        assert_eq!(
            status_filter(Some("in_progress")).unwrap(),
            doc! { "status": "in_progress" }
        );
    }

    #[test]
    fn status_filter_rejects_unknown_statuses() {
        assert!(matches!(
            status_filter(Some("pending")),
            Err(ApiError::BadRequest(_))
        ));
    }
}
