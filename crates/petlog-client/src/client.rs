//! reqwest implementation of the PetLog backend

use async_trait::async_trait;
use petlog_api::{
    AccessTokenData, ActivityKind, ActivityLogDto, ActivityLogRecord, ApiError, ApiResult,
    CreateActivityLogRequest, CreateGroupRequest, CredentialRefresher, Credentials, CurrentUser,
    Endpoint, HomeData, HttpMethod, InviteCodeData, JoinGroupRequest, KakaoLoginRequest,
    LoginData, LoginRequest, NewActivityLog, NewGroup, NoteBody, PetInfoDto, PetLogBackend,
    ProfileUpdate, RegisterRequest, TokenPairData, UpdatePetRequest, UserDetailData,
};
use petlog_config::ClientConfig;
use petlog_util::{GroupId, UserId};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::{ClientError, ClientResult, Session};

const NO_BODY: Option<&()> = None;

/// Bearer token to attach to a request
enum Auth {
    /// The session's access token, if the endpoint needs one
    Session,
    /// A specific token, used by the refresh call
    Token(String),
}

/// PetLog REST client
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
    session: Arc<Session>,
}

impl HttpBackend {
    /// Build a client for the configured server; the request timeout is
    /// enforced by reqwest.
    pub fn new(config: &ClientConfig, session: Arc<Session>) -> ClientResult<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|source| ClientError::InvalidBaseUrl {
            url: base_url.clone(),
            source,
        })?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        debug!(base_url = %base_url, timeout = ?config.timeout, "HTTP backend ready");

        Ok(Self {
            http,
            base_url,
            session,
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // Auth flows

    /// Sign in with a provider account; `NotFound` means it is not registered yet.
    pub async fn login(
        &self,
        oauth_provider: &str,
        oauth_id: &str,
        email: Option<&str>,
    ) -> ApiResult<Credentials> {
        let request = LoginRequest {
            oauth_provider: oauth_provider.to_string(),
            oauth_id: oauth_id.to_string(),
            email: email.map(str::to_string),
        };
        let data: LoginData = self.call(Endpoint::Login, Some(&request)).await?;
        Ok(self.sign_in(data))
    }

    pub async fn register(&self, request: &RegisterRequest) -> ApiResult<Credentials> {
        let data: LoginData = self.call(Endpoint::Register, Some(request)).await?;
        Ok(self.sign_in(data))
    }

    /// Exchange a Kakao authorization code for a token pair.
    pub async fn kakao_login(&self, access_code: &str) -> ApiResult<Credentials> {
        let request = KakaoLoginRequest {
            access_code: access_code.to_string(),
        };
        let data: TokenPairData = self.call(Endpoint::KakaoLogin, Some(&request)).await?;
        let credentials = Credentials {
            user_id: None,
            access_token: data.access_token,
            refresh_token: Some(data.refresh_token),
        };
        self.session.set(&credentials);
        info!("Signed in with Kakao");
        Ok(credentials)
    }

    /// Obtain a new access token, presenting the refresh token when there is one.
    pub async fn refresh(&self) -> ApiResult<String> {
        let token = self
            .session
            .refresh_token()
            .or_else(|| self.session.access_token())
            .ok_or_else(|| ApiError::unauthorized("no credentials to refresh"))?;

        let data: AccessTokenData = self
            .request(Endpoint::RefreshToken, NO_BODY, Auth::Token(token))
            .await
            .and_then(|text| decode_payload(&text))?;

        self.session.set_access_token(data.access_token.clone());
        info!("Access token refreshed");
        Ok(data.access_token)
    }

    pub async fn current_user(&self) -> ApiResult<CurrentUser> {
        let data: UserDetailData = self.call(Endpoint::CurrentUser, NO_BODY).await?;
        Ok(data.into())
    }

    /// Delete the account and end the session.
    pub async fn withdraw(&self) -> ApiResult<()> {
        self.call_ack(Endpoint::Withdraw, NO_BODY).await?;
        self.session.clear();
        info!("Account withdrawn");
        Ok(())
    }

    pub fn logout(&self) {
        self.session.clear();
        info!("Signed out");
    }

    fn sign_in(&self, data: LoginData) -> Credentials {
        let credentials = Credentials {
            user_id: Some(UserId::new(data.user_id)),
            access_token: data.token,
            refresh_token: None,
        };
        self.session.set(&credentials);
        info!(user_id = ?credentials.user_id, "Signed in");
        credentials
    }

    /// Group of the signed-in user; `NotFound` before joining one.
    async fn group_id(&self) -> ApiResult<GroupId> {
        self.current_user()
            .await?
            .group_id
            .ok_or_else(|| ApiError::not_found("user has not joined a group"))
    }

    async fn invite_code_for(&self, group: GroupId) -> ApiResult<String> {
        let data: InviteCodeData = self.call(Endpoint::InviteCode(group), NO_BODY).await?;
        data.get("joinCode")
            .cloned()
            .ok_or_else(|| ApiError::malformed("invite response without joinCode"))
    }

    // Transport

    async fn call<T, B>(&self, endpoint: Endpoint, body: Option<&B>) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let text = self.request(endpoint, body, Auth::Session).await?;
        decode_payload(&text)
    }

    /// Call an endpoint whose response carries nothing we need.
    async fn call_ack<B>(&self, endpoint: Endpoint, body: Option<&B>) -> ApiResult<()>
    where
        B: Serialize + ?Sized,
    {
        self.request(endpoint, body, Auth::Session).await.map(|_| ())
    }

    async fn request<B>(&self, endpoint: Endpoint, body: Option<&B>, auth: Auth) -> ApiResult<String>
    where
        B: Serialize + ?Sized,
    {
        let path = endpoint.path();
        let url = format!("{}{}", self.base_url, path);
        let method = endpoint.method();

        let mut builder = match method {
            HttpMethod::Get => self.http.get(&url),
            HttpMethod::Post => self.http.post(&url),
            HttpMethod::Patch => self.http.patch(&url),
            HttpMethod::Delete => self.http.delete(&url),
        };

        let token = match auth {
            Auth::Token(token) => Some(token),
            Auth::Session if endpoint.requires_auth() => Some(
                self.session
                    .access_token()
                    .ok_or_else(|| ApiError::unauthorized("not signed in"))?,
            ),
            Auth::Session => None,
        };
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        debug!(method = method.as_str(), path = %path, "Sending request");

        let response = builder.send().await.map_err(|e| {
            warn!(path = %path, error = %e, "Request failed");
            ApiError::network(e.to_string())
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::network(e.to_string()))?;

        if !status.is_success() {
            let err = ApiError::from_status(status.as_u16(), error_message(&text));
            warn!(path = %path, status = status.as_u16(), error = %err, "Server returned an error");
            return Err(err);
        }

        Ok(text)
    }
}

/// Decode a response body, unwrapping the `{ statusCode, message, data }`
/// envelope when present.
fn decode_payload<T: DeserializeOwned>(text: &str) -> ApiResult<T> {
    let mut value: Value = serde_json::from_str(text)?;
    let payload = if value.get("statusCode").is_some() {
        value.get_mut("data").map(Value::take).unwrap_or(Value::Null)
    } else {
        value
    };
    Ok(serde_json::from_value(payload)?)
}

/// The envelope's `message` if the error body has one, else the raw body
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl CredentialRefresher for HttpBackend {
    async fn refresh_credentials(&self) -> ApiResult<()> {
        self.refresh().await.map(|_| ())
    }
}

#[async_trait]
impl PetLogBackend for HttpBackend {
    async fn fetch_home(&self) -> ApiResult<HomeData> {
        let group = self.group_id().await?;
        let pet: PetInfoDto = self.call(Endpoint::PetInfo(group.clone()), NO_BODY).await?;
        let invite_code = self.invite_code_for(group).await?;
        pet.into_home(invite_code)
    }

    async fn submit_log(
        &self,
        kind: ActivityKind,
        log: &NewActivityLog,
    ) -> ApiResult<ActivityLogRecord> {
        let request = CreateActivityLogRequest {
            checker_name: log.actor_name.clone(),
            memo: log.note.clone(),
        };
        let dto: ActivityLogDto = self.call(Endpoint::CreateLog(kind), Some(&request)).await?;
        info!(kind = %kind, id = %dto.id, "Activity logged");
        Ok(dto.into())
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> ApiResult<()> {
        let group = self.group_id().await?;
        let request = UpdatePetRequest::from(update);
        self.call_ack(Endpoint::UpdatePet(group), Some(&request)).await
    }

    async fn join_group(&self, invite_code: &str) -> ApiResult<()> {
        let request = JoinGroupRequest {
            join_code: invite_code.to_string(),
        };
        self.call_ack(Endpoint::JoinGroup, Some(&request)).await?;
        info!(code = %invite_code, "Joined group");
        Ok(())
    }

    async fn create_group(&self, group: &NewGroup) -> ApiResult<()> {
        let request = CreateGroupRequest::from(group);
        self.call_ack(Endpoint::CreateGroup, Some(&request)).await?;
        info!(pet = %group.profile.name, "Group created");
        Ok(())
    }

    async fn invite_code(&self) -> ApiResult<String> {
        let group = self.group_id().await?;
        self.invite_code_for(group).await
    }

    async fn fetch_note(&self) -> ApiResult<Option<String>> {
        let group = self.group_id().await?;
        let body: NoteBody = self.call(Endpoint::Note(group), NO_BODY).await?;
        Ok(body.note)
    }

    async fn update_note(&self, note: Option<&str>) -> ApiResult<()> {
        let group = self.group_id().await?;
        let body = NoteBody {
            note: note.map(str::to_string),
        };
        self.call_ack(Endpoint::UpdateNote(group), Some(&body)).await
    }
}
