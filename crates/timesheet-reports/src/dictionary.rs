//! Portal dictionaries: active users and smart process types

use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::info;

use crate::bitrix::BitrixClient;
use crate::constants;
use crate::error::Result;
use crate::record::RawRecord;

/// Active portal user as shown in employee pickers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortalUser {
    pub id: String,
    pub name: String,
    pub avatar: Option<String>,
}

impl PortalUser {
    /// Build from a `user.get` item; items without an `ID` are dropped
    fn from_raw(raw: &RawRecord) -> Option<Self> {
        let id = raw.get_str("ID")?;
        let first = raw.get_str("NAME").unwrap_or_default();
        let last = raw.get_str("LAST_NAME").unwrap_or_default();

        Some(Self {
            id,
            name: format!("{} {}", first, last).trim().to_string(),
            avatar: raw.get_str("PERSONAL_PHOTO"),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct UserList {
    pub items: Vec<PortalUser>,
}

/// Fetch every active user
pub async fn fetch_active_users(client: &BitrixClient) -> Result<UserList> {
    let mut params = Map::new();
    params.insert("FILTER".to_string(), json!({ "ACTIVE": "Y" }));

    let raw_users = client
        .fetch_all(constants::METHOD_USER_GET, params, constants::DEFAULT_FETCH_LIMIT)
        .await?;

    let items: Vec<PortalUser> = raw_users
        .into_iter()
        .filter_map(RawRecord::from_value)
        .filter_map(|raw| PortalUser::from_raw(&raw))
        .collect();

    info!(count = items.len(), "fetched active users");

    Ok(UserList { items })
}

/// Smart process type listing from `crm.type.list`
pub async fn fetch_smart_process_types(client: &BitrixClient) -> Result<Value> {
    let response = client.call(constants::METHOD_TYPE_LIST, Map::new()).await?;
    let types = response.get("result").cloned().unwrap_or_else(|| json!([]));

    Ok(json!({ "types": types }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> BitrixClient {
        let credentials = Credentials {
            domain: "example.bitrix24.ru".to_string(),
            access_token: "secret-token".to_string(),
        };
        BitrixClient::with_base_url(
            format!("{}/rest", server.uri()),
            &credentials,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_user_name_joined_and_trimmed() {
        let raw = RawRecord::from_value(json!({
            "ID": "5",
            "NAME": "Alice",
            "LAST_NAME": "",
            "PERSONAL_PHOTO": "https://cdn.example/a.png"
        }))
        .unwrap();

        let user = PortalUser::from_raw(&raw).unwrap();
        assert_eq!(user.id, "5");
        assert_eq!(user.name, "Alice");
        assert_eq!(user.avatar.as_deref(), Some("https://cdn.example/a.png"));
    }

    #[test]
    fn test_user_without_id_dropped() {
        let raw = RawRecord::from_value(json!({ "NAME": "Ghost" })).unwrap();
        assert!(PortalUser::from_raw(&raw).is_none());
    }

    #[tokio::test]
    async fn test_fetch_active_users() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/user.get"))
            .and(body_partial_json(json!({ "FILTER": { "ACTIVE": "Y" }, "start": 0 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [
                    { "ID": "1", "NAME": "Alice", "LAST_NAME": "Smith" },
                    { "ID": 2, "NAME": "Bob", "PERSONAL_PHOTO": null }
                ],
                "total": 2
            })))
            .expect(1)
            .mount(&server)
            .await;

        let users = fetch_active_users(&client_for(&server)).await.unwrap();

        assert_eq!(
            users.items,
            vec![
                PortalUser {
                    id: "1".to_string(),
                    name: "Alice Smith".to_string(),
                    avatar: None,
                },
                PortalUser {
                    id: "2".to_string(),
                    name: "Bob".to_string(),
                    avatar: None,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_fetch_smart_process_types() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/crm.type.list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": { "types": [{ "entityTypeId": 1164, "title": "Timesheet" }] }
            })))
            .mount(&server)
            .await;

        let types = fetch_smart_process_types(&client_for(&server)).await.unwrap();
        assert_eq!(types["types"]["types"][0]["entityTypeId"], json!(1164));
    }
}
