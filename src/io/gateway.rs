//! HTTP gateway to the card management API
//!
//! `HttpGateway` implements every API trait on top of `reqwest`. It attaches
//! the session's bearer token to each request, maps failed statuses onto
//! `LedgerError` and normalizes response bodies through `envelope`. It holds
//! no business logic.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use super::envelope::{decode, decode_keyed, decode_load_count, error_message};
use crate::config::Config;
use crate::core::traits::{AuthApi, CardApi, OperationApi, UserApi};
use crate::core::SessionStore;
use crate::types::{
    Amount, Card, CardId, LedgerError, LoadId, LoginResponse, NewUser, Operation, OperationId,
    OperationRequest, Recharge, RechargeRequest, User, UserId, UserUpdate, UserWithCards,
};

pub struct HttpGateway {
    client: Client,
    base_url: String,
    session: Arc<SessionStore>,
}

impl HttpGateway {
    pub fn new(config: &Config, session: Arc<SessionStore>) -> Result<Self, LedgerError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| LedgerError::Config {
            message: format!("cannot build HTTP client: {e}"),
        })?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "api request");
        let builder = self.client.request(method, url);
        match self.session.token().await {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send and return the body of a successful response
    async fn execute(&self, builder: RequestBuilder) -> Result<String, LedgerError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            Ok(body)
        } else {
            let reason = status.canonical_reason().unwrap_or("request failed");
            Err(LedgerError::from_status(
                status.as_u16(),
                error_message(&body, reason),
            ))
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, LedgerError> {
        let body = self.execute(self.request(Method::GET, path).await).await?;
        decode(&body)
    }

    async fn send<B, T>(&self, method: Method, path: &str, payload: &B) -> Result<T, LedgerError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let builder = self.request(method, path).await.json(payload);
        let body = self.execute(builder).await?;
        decode(&body)
    }

    async fn delete(&self, path: &str) -> Result<(), LedgerError> {
        self.execute(self.request(Method::DELETE, path).await)
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl AuthApi for HttpGateway {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, LedgerError> {
        let payload = json!({ "email": email, "password": password });
        self.send(Method::POST, "/auth/login", &payload).await
    }

    async fn register(&self, user: &NewUser) -> Result<User, LedgerError> {
        let body = self
            .execute(
                self.request(Method::POST, "/auth/register")
                    .await
                    .json(user),
            )
            .await?;
        decode_keyed(&body, "user")
    }

    async fn me(&self) -> Result<User, LedgerError> {
        let body = self
            .execute(self.request(Method::GET, "/auth/me").await)
            .await?;
        decode_keyed(&body, "user")
    }
}

#[async_trait]
impl UserApi for HttpGateway {
    async fn list_users(&self) -> Result<Vec<User>, LedgerError> {
        self.get("/users").await
    }

    async fn get_user(&self, id: UserId) -> Result<User, LedgerError> {
        self.get(&format!("/users/{id}")).await
    }

    async fn update_user(&self, id: UserId, update: &UserUpdate) -> Result<User, LedgerError> {
        let body = self
            .execute(
                self.request(Method::PUT, &format!("/users/{id}"))
                    .await
                    .json(update),
            )
            .await?;
        decode_keyed(&body, "user")
    }

    async fn delete_user(&self, id: UserId) -> Result<(), LedgerError> {
        self.delete(&format!("/users/{id}")).await
    }

    async fn users_with_balance(&self) -> Result<Vec<UserWithCards>, LedgerError> {
        self.get("/users/with-balance").await
    }
}

#[async_trait]
impl CardApi for HttpGateway {
    async fn user_cards(&self, user_id: UserId) -> Result<Vec<Card>, LedgerError> {
        self.get(&format!("/cards/user/{user_id}")).await
    }

    async fn recharge(&self, card_id: CardId, amount: Amount) -> Result<Recharge, LedgerError> {
        let payload = RechargeRequest {
            amount: amount.value(),
        };
        self.send(Method::POST, &format!("/cards/load/{card_id}"), &payload)
            .await
    }

    async fn card_loads(&self, card_id: CardId) -> Result<Vec<Recharge>, LedgerError> {
        self.get(&format!("/cards/loads/{card_id}")).await
    }

    async fn card_load_count(&self, card_id: CardId) -> Result<u64, LedgerError> {
        let body = self
            .execute(
                self.request(Method::GET, &format!("/cards/loads/count/{card_id}"))
                    .await,
            )
            .await?;
        decode_load_count(&body)
    }

    async fn update_load(
        &self,
        load_id: LoadId,
        amount: Amount,
    ) -> Result<Recharge, LedgerError> {
        let payload = RechargeRequest {
            amount: amount.value(),
        };
        self.send(Method::PUT, &format!("/cards/load/{load_id}"), &payload)
            .await
    }

    async fn delete_load(&self, load_id: LoadId) -> Result<(), LedgerError> {
        self.delete(&format!("/cards/load/{load_id}")).await
    }
}

#[async_trait]
impl OperationApi for HttpGateway {
    async fn card_operations(&self, card_id: CardId) -> Result<Vec<Operation>, LedgerError> {
        self.get(&format!("/operations/{card_id}")).await
    }

    async fn add_operation(
        &self,
        card_id: CardId,
        request: &OperationRequest,
    ) -> Result<Operation, LedgerError> {
        self.send(Method::POST, &format!("/operations/{card_id}"), request)
            .await
    }

    async fn update_operation(
        &self,
        operation_id: OperationId,
        request: &OperationRequest,
    ) -> Result<Operation, LedgerError> {
        self.send(Method::PUT, &format!("/operations/{operation_id}"), request)
            .await
    }

    async fn delete_operation(&self, operation_id: OperationId) -> Result<(), LedgerError> {
        self.delete(&format!("/operations/{operation_id}")).await
    }
}
