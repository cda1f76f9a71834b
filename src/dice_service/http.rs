use super::{
    DiceService,
    RollOutcome,
};
use crate::{
    error::ServiceError,
    odds::DiceValue,
    seed::PublicSeed,
};
use serde::{
    Deserialize,
    Serialize,
    de::DeserializeOwned,
};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://new-dice-game-backend.onrender.com";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct HttpDiceService {
    base_url: String,
    http: reqwest::Client,
}

impl HttpDiceService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, ServiceError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        debug!(%url, "dice service request");
        let res = self.http.post(url).json(body).send().await?;
        let status = res.status();
        let bytes = res.bytes().await?;
        if !status.is_success() {
            return Err(ServiceError::Status {
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        serde_json::from_slice(&bytes)
            .map_err(|err| ServiceError::Malformed(format!("{path} payload: {err}")))
    }
}

impl DiceService for HttpDiceService {
    async fn roll(&self, public_seed: &PublicSeed) -> Result<RollOutcome, ServiceError> {
        let request = RollRequestDto {
            public_seed: public_seed.as_str(),
        };
        let dto: RollResponseDto = self.post_json("roll", &request).await?;
        dto.try_into()
    }

    async fn verify(
        &self,
        public_seed: &PublicSeed,
        server_seed: &str,
        original_hash: &str,
    ) -> Result<bool, ServiceError> {
        let request = VerifyRequestDto {
            public_seed: public_seed.as_str(),
            server_seed,
            original_hash,
        };
        let dto: VerifyResponseDto = self.post_json("verify", &request).await?;
        Ok(dto.valid)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RollRequestDto<'a> {
    public_seed: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RollResponseDto {
    dice: i64,
    hash: String,
    server_seed: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequestDto<'a> {
    public_seed: &'a str,
    server_seed: &'a str,
    original_hash: &'a str,
}

#[derive(Debug, Deserialize)]
struct VerifyResponseDto {
    valid: bool,
}

impl TryFrom<RollResponseDto> for RollOutcome {
    type Error = ServiceError;

    fn try_from(dto: RollResponseDto) -> Result<Self, Self::Error> {
        let dice = DiceValue::try_from(dto.dice).map_err(ServiceError::Malformed)?;
        if dto.hash.is_empty() || dto.server_seed.is_empty() {
            return Err(ServiceError::Malformed(
                "roll response is missing its hash or server seed".to_string(),
            ));
        }
        Ok(RollOutcome {
            dice,
            hash: dto.hash,
            server_seed: dto.server_seed,
        })
    }
}
