use async_trait::async_trait;
use reqwest::{multipart, Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};
use url::Url;

use crate::error::{server_message, PortalError};
use crate::filters::FilterState;
use crate::models::{Applicant, Job, JobDraft};

const LOGIN_PATH: &str = "api/auth/loginUser";
const LIST_JOBS_PATH: &str = "api/jobportal/getAllJobPostings";
const JOB_BY_ID_PATH: &str = "api/jobPortal/getJobPostingById";
const UPDATE_JOB_PATH: &str = "api/jobportal/updateJobPosting";
const POST_JOB_PATH: &str = "api/jobportal/jobPostings";
const APPLICATIONS_PATH: &str = "api/jobPortal/getAllApplications";

const LOGIN_REJECTED: &str = "Invalid email or password. Please try again.";
const LOGIN_FAILED: &str = "Login failed. Please try again.";
const POST_FAILED: &str = "Failed to post job. Please try again.";

#[async_trait]
pub trait JobSource: Send + Sync {
    async fn list_jobs(&self, filters: &FilterState, token: &SecretString) -> Result<Vec<Job>, PortalError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Credentials<'a> {
    email: &'a str,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: Option<String>,
    message: Option<String>,
}

/// Lowercase hex MD5 digest, the form the login endpoint expects.
pub fn hash_password(password: &str) -> String {
    format!("{:x}", md5::compute(password.as_bytes()))
}

/// Reads `jobPostings` from a listing body. Anything missing or malformed
/// yields an empty list; array entries that are not objects are skipped.
pub fn parse_job_postings(body: &str) -> Vec<Job> {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        warn!("Listing response is not JSON; treating as empty");
        return Vec::new();
    };
    let Some(postings) = value.get("jobPostings").and_then(Value::as_array) else {
        return Vec::new();
    };
    postings
        .iter()
        .filter_map(|posting| match Job::deserialize(posting) {
            Ok(job) if posting.is_object() => Some(job),
            _ => {
                warn!("Skipping malformed job posting: {}", posting);
                None
            }
        })
        .collect()
}

/// Reads the `Applications` array, insisting on `Status: "Success"`.
pub fn parse_applications(body: &str) -> Result<Vec<Applicant>, PortalError> {
    let value: Value = serde_json::from_str(body)?;
    let success = value.get("Status").and_then(Value::as_str) == Some("Success");
    match value.get("Applications").and_then(Value::as_array) {
        Some(applications) if success => Ok(applications
            .iter()
            .filter_map(|a| Applicant::deserialize(a).ok())
            .collect()),
        _ => Err(PortalError::UnexpectedResponse),
    }
}

#[derive(Clone)]
pub struct PortalClient {
    client: Client,
    base: Url,
}

impl PortalClient {
    pub fn new(base: Url) -> Self {
        Self {
            client: Client::new(),
            base,
        }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, PortalError> {
        Ok(self.base.join(path)?)
    }

    fn endpoint_with_id(&self, path: &str, id: &str) -> Result<Url, PortalError> {
        let mut url = self.endpoint(path)?;
        url.path_segments_mut()
            .map_err(|_| PortalError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .push(id);
        Ok(url)
    }

    async fn body(response: Response) -> Result<(StatusCode, String), PortalError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(PortalError::from_response(status.as_u16(), &body));
        }
        Ok((status, body))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<SecretString, PortalError> {
        let credentials = Credentials {
            email,
            password: hash_password(password),
        };

        let response = match self
            .client
            .post(self.endpoint(LOGIN_PATH)?)
            .json(&credentials)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("Login request failed: {}", e);
                return Err(PortalError::LoginFailed(LOGIN_REJECTED.to_string()));
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!("Login rejected with status {}", status);
            return Err(PortalError::LoginFailed(LOGIN_REJECTED.to_string()));
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|_| PortalError::LoginFailed(LOGIN_REJECTED.to_string()))?;

        match (status, body.token) {
            (StatusCode::OK, Some(token)) if !token.is_empty() => Ok(SecretString::from(token)),
            (StatusCode::OK, _) => Err(PortalError::UnexpectedResponse),
            _ => Err(PortalError::LoginFailed(
                body.message.unwrap_or_else(|| LOGIN_FAILED.to_string()),
            )),
        }
    }

    pub async fn get_job(&self, id: &str, token: &SecretString) -> Result<Job, PortalError> {
        let response = self
            .client
            .get(self.endpoint_with_id(JOB_BY_ID_PATH, id)?)
            .bearer_auth(token.expose_secret())
            .send()
            .await?;
        let (_, body) = Self::body(response).await?;

        let value: Value = serde_json::from_str(&body)?;
        Job::from_detail(&value).ok_or_else(|| PortalError::NotFound("No job data found.".to_string()))
    }

    /// Saves an edited job. Paragraph wrappers are stripped before sending.
    pub async fn update_job(&self, id: &str, draft: &JobDraft, token: &SecretString) -> Result<(), PortalError> {
        let payload = draft.without_paragraph_tags();
        debug!(id, "Updating job posting");

        let response = self
            .client
            .put(self.endpoint_with_id(UPDATE_JOB_PATH, id)?)
            .bearer_auth(token.expose_secret())
            .json(&payload)
            .send()
            .await?;
        Self::body(response).await?;
        Ok(())
    }

    pub async fn post_job(&self, draft: &JobDraft, token: &SecretString) -> Result<(), PortalError> {
        let payload = draft.sanitized();

        let response = match self
            .client
            .post(self.endpoint(POST_JOB_PATH)?)
            .bearer_auth(token.expose_secret())
            .json(&payload)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("Post job request failed: {}", e);
                return Err(PortalError::PostFailed(POST_FAILED.to_string()));
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::OK | StatusCode::CREATED => Ok(()),
            _ => Err(PortalError::Api {
                status: status.as_u16(),
                message: server_message(&body).unwrap_or_else(|| POST_FAILED.to_string()),
            }),
        }
    }

    pub async fn upload_document(&self, path: &Path, token: &SecretString) -> Result<Option<String>, PortalError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());

        let form = multipart::Form::new().part("file", multipart::Part::bytes(bytes).file_name(file_name));

        let response = self
            .client
            .post(self.endpoint(POST_JOB_PATH)?)
            .bearer_auth(token.expose_secret())
            .multipart(form)
            .send()
            .await?;
        let (_, body) = Self::body(response).await?;

        let value: Value = serde_json::from_str(&body)?;
        Ok(value
            .get("fileUrl")
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
            .map(str::to_string))
    }

    pub async fn list_applicants(&self, token: &SecretString) -> Result<Vec<Applicant>, PortalError> {
        let response = self
            .client
            .get(self.endpoint(APPLICATIONS_PATH)?)
            .bearer_auth(token.expose_secret())
            .send()
            .await?;
        let (_, body) = Self::body(response).await?;
        parse_applications(&body)
    }
}

#[async_trait]
impl JobSource for PortalClient {
    async fn list_jobs(&self, filters: &FilterState, token: &SecretString) -> Result<Vec<Job>, PortalError> {
        let params = filters.api_params();
        debug!(filters = %filters.to_query(), "Fetching job postings");

        let response = self
            .client
            .get(self.endpoint(LIST_JOBS_PATH)?)
            .bearer_auth(token.expose_secret())
            .query(&params)
            .send()
            .await?;
        let (_, body) = Self::body(response).await?;

        let jobs = parse_job_postings(&body);
        debug!(count = jobs.len(), "Fetched job postings");
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> PortalClient {
        PortalClient::new(Url::parse("http://portal.test:3120/").unwrap())
    }

    #[test]
    fn test_hash_password_is_md5_hex() {
        assert_eq!(hash_password("password"), "5f4dcc3b5aa765d61d8327deb882cf99");
        assert_eq!(hash_password(""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_credentials_shape() {
        let value = serde_json::to_value(Credentials {
            email: "hr@example.com",
            password: hash_password("password"),
        })
        .unwrap();
        assert_eq!(value["Email"], "hr@example.com");
        assert_eq!(value["Password"], "5f4dcc3b5aa765d61d8327deb882cf99");
    }

    #[test]
    fn test_parse_job_postings() {
        let body = r#"{"jobPostings":[{"Id":1,"Title":"A","City":"Pune"},{"Id":2,"Title":"B"}]}"#;
        let jobs = parse_job_postings(body);
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].city.as_deref(), Some("Pune"));
        assert_eq!(jobs[1].id(), "2");
    }

    #[test]
    fn test_parse_job_postings_defaults_to_empty() {
        assert!(parse_job_postings("{}").is_empty());
        assert!(parse_job_postings(r#"{"jobPostings":null}"#).is_empty());
        assert!(parse_job_postings(r#"{"jobPostings":"oops"}"#).is_empty());
        assert!(parse_job_postings("<html>502</html>").is_empty());
    }

    #[test]
    fn test_parse_job_postings_skips_non_objects() {
        let jobs = parse_job_postings(r#"{"jobPostings":[3,{"Id":"x"},null]}"#);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id(), "x");
    }

    #[test]
    fn test_parse_applications() {
        let body = r#"{"Status":"Success","Applications":[{"JobTitle":"QA","Candidate":{"FullName":"Ravi"}}]}"#;
        let applicants = parse_applications(body).unwrap();
        assert_eq!(applicants.len(), 1);
        assert_eq!(applicants[0].name(), "Ravi");

        let failed = parse_applications(r#"{"Status":"Failed","Applications":[]}"#);
        assert!(matches!(failed, Err(PortalError::UnexpectedResponse)));

        let missing = parse_applications(r#"{"Status":"Success"}"#);
        assert!(matches!(missing, Err(PortalError::UnexpectedResponse)));
    }

    #[test]
    fn test_endpoints() {
        let client = client();
        assert_eq!(
            client.endpoint(LIST_JOBS_PATH).unwrap().as_str(),
            "http://portal.test:3120/api/jobportal/getAllJobPostings"
        );
        assert_eq!(
            client.endpoint_with_id(JOB_BY_ID_PATH, "a b/c").unwrap().as_str(),
            "http://portal.test:3120/api/jobPortal/getJobPostingById/a%20b%2Fc"
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_is_http_error() {
        let client = PortalClient::new(Url::parse("http://127.0.0.1:9/").unwrap());
        let token = SecretString::from("t".to_string());
        let result = client.list_jobs(&FilterState::new(), &token).await;
        assert!(matches!(result, Err(PortalError::Http(_))));
    }

    #[tokio::test]
    async fn test_post_job_transport_failure_uses_fallback_message() {
        let client = PortalClient::new(Url::parse("http://127.0.0.1:9/").unwrap());
        let token = SecretString::from("t".to_string());
        let err = client.post_job(&JobDraft::default(), &token).await.unwrap_err();
        assert!(matches!(err, PortalError::PostFailed(_)));
        assert_eq!(err.to_string(), "Failed to post job. Please try again.");
    }
}
