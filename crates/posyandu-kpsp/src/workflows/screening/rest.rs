use chrono::{Local, NaiveDate};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::backend::{BackendError, ScopedBackend, ScreeningBackend};
use super::domain::{
    AgeBracket, Child, ChildId, Questionnaire, ScreeningRecord, ScreeningResult,
    SubmissionPayload,
};
use super::wire::{
    Envelope, ErrorBody, WireChild, WireQuestionnaire, WireResult, WireScreening,
};
use crate::auth::SessionContext;
use crate::config::BackendConfig;

const CHILDREN_PATH: &str = "kpsp/children";
const QUESTIONNAIRE_PATH: &str = "kpsp/categories/age/";
const HISTORY_PATH: &str = "kpsp/screenings/child/";
const SUBMIT_PATH: &str = "kpsp/screenings";

/// `ScreeningBackend` over the Posyandu REST API.
#[derive(Debug, Clone)]
pub struct RestScreeningBackend {
    client: Client,
    base_url: Url,
    session: SessionContext,
}

impl RestScreeningBackend {
    pub fn new(config: &BackendConfig, session: SessionContext) -> Result<Self, BackendError> {
        let client = Client::builder()
            .user_agent(concat!("posyandu-kpsp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| BackendError::Transport(err.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            session,
        })
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.base_url
            .join(path)
            .map_err(|err| BackendError::Transport(format!("invalid endpoint '{path}': {err}")))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, BackendError> {
        let url = self.endpoint(path)?;
        debug!(%url, "GET");
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(|err| BackendError::Transport(err.to_string()))?;
        read_envelope(response).await
    }

    fn today() -> NaiveDate {
        Local::now().date_naive()
    }
}

async fn read_envelope<T: DeserializeOwned>(response: Response) -> Result<Option<T>, BackendError> {
    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|err| BackendError::Transport(err.to_string()))?;

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(BackendError::Unauthorized);
    }

    if !status.is_success() {
        let message = serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(|error| error.message)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            });
        return Err(BackendError::Rejected {
            status: status.as_u16(),
            message,
        });
    }

    let envelope: Envelope<T> = serde_json::from_slice(&body)
        .map_err(|err| BackendError::InvalidPayload(err.to_string()))?;

    if envelope.success == Some(false) {
        return Err(BackendError::Rejected {
            status: status.as_u16(),
            message: envelope
                .message
                .unwrap_or_else(|| "request was not successful".to_string()),
        });
    }

    Ok(envelope.data)
}

impl ScopedBackend for RestScreeningBackend {
    /// Shares the connection pool; only the credential differs.
    fn scoped(&self, credential: SessionContext) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            session: credential,
        }
    }
}

impl ScreeningBackend for RestScreeningBackend {
    async fn children(&self) -> Result<Vec<Child>, BackendError> {
        let today = Self::today();
        self.fetch::<Vec<WireChild>>(CHILDREN_PATH)
            .await?
            .unwrap_or_default()
            .into_iter()
            .map(|child| child.into_child(today))
            .collect()
    }

    async fn questionnaire_for(
        &self,
        bracket: AgeBracket,
    ) -> Result<Option<Questionnaire>, BackendError> {
        let path = format!("{QUESTIONNAIRE_PATH}{}", bracket.code());
        match self.fetch::<WireQuestionnaire>(&path).await {
            Ok(Some(questionnaire)) => questionnaire.into_questionnaire(bracket).map(Some),
            Ok(None) => Ok(None),
            Err(BackendError::Rejected { status: 404, .. }) => {
                warn!(bracket = bracket.code(), "no questionnaire registered for bracket");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn history_for(&self, child_id: &ChildId) -> Result<Vec<ScreeningRecord>, BackendError> {
        let path = format!("{HISTORY_PATH}{child_id}");
        self.fetch::<Vec<WireScreening>>(&path)
            .await?
            .unwrap_or_default()
            .into_iter()
            .map(WireScreening::into_record)
            .collect()
    }

    async fn submit(&self, payload: &SubmissionPayload) -> Result<ScreeningResult, BackendError> {
        let url = self.endpoint(SUBMIT_PATH)?;
        debug!(%url, child_id = %payload.child_id, answers = payload.answers.len(), "POST");
        let response = self
            .authorize(self.client.post(url))
            .json(payload)
            .send()
            .await
            .map_err(|err| BackendError::Transport(err.to_string()))?;

        read_envelope::<WireResult>(response)
            .await?
            .ok_or_else(|| BackendError::InvalidPayload("submission returned no result".to_string()))?
            .into_result(Self::today())
    }
}
