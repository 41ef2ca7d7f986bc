use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use url::Url;

use crate::filters::FacetKey;
use crate::html;

/// Accepts a string, number, bool or null where the API promises a string.
fn lenient<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Job {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub experience_required: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub experience: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub salary_range: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub salary: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub job_responsibilities: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub skills_required: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub edu_qualifications: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub jd_document_url: Option<String>,
}

impl Job {
    /// Decodes the body of the single-job endpoint, which also ships
    /// lowercase and `address`-nested variants of the location fields.
    pub fn from_detail(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        let mut job = Job::deserialize(value).ok()?;

        let address = value.get("address");
        let fallback = |lower: &str, nested: Option<&str>| -> Option<String> {
            let direct = value.get(lower).and_then(scalar_string);
            let nested = nested
                .and_then(|k| address.and_then(|a| a.get(k)))
                .and_then(scalar_string);
            direct.or(nested).filter(|s| !s.is_empty())
        };

        if non_empty(&job.city).is_none() {
            job.city = fallback("city", Some("City"));
        }
        if non_empty(&job.state).is_none() {
            job.state = fallback("state", Some("State"));
        }
        if non_empty(&job.country).is_none() {
            job.country = fallback("country", Some("Country"));
        }
        if non_empty(&job.experience).is_none() {
            job.experience = fallback("experience", None);
        }
        if non_empty(&job.salary).is_none() {
            job.salary = fallback("salary", None);
        }

        Some(job)
    }

    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    pub fn display_title(&self) -> String {
        html::strip_tags(self.title.as_deref().unwrap_or_default())
    }

    pub fn experience(&self) -> Option<&str> {
        non_empty(&self.experience_required).or_else(|| non_empty(&self.experience))
    }

    pub fn salary(&self) -> Option<&str> {
        non_empty(&self.salary_range).or_else(|| non_empty(&self.salary))
    }

    pub fn location(&self) -> String {
        format!(
            "{}, {}",
            self.city.as_deref().unwrap_or_default(),
            self.state.as_deref().unwrap_or_default()
        )
    }

    pub fn facet(&self, key: FacetKey) -> Option<&str> {
        match key {
            FacetKey::Cities => non_empty(&self.city),
            FacetKey::Departments => non_empty(&self.department),
            FacetKey::JobTypes => non_empty(&self.job_type),
            FacetKey::Experiences => self.experience(),
            FacetKey::Salaries => self.salary(),
        }
    }

    pub fn page_url(&self, web_base: &Url) -> Result<Url, url::ParseError> {
        let mut url = web_base.join("jobdescription/")?;
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .push(self.id());
        Ok(url)
    }

    pub fn share_links(&self, web_base: &Url) -> Result<Vec<(&'static str, String)>, url::ParseError> {
        let page = self.page_url(web_base)?;
        let page = page.as_str();

        let with_query = |base: &str, pairs: &[(&str, &str)]| -> Result<String, url::ParseError> {
            Ok(Url::parse_with_params(base, pairs)?.to_string())
        };

        let message = format!("Check out this job! {}", page);
        let email_body = format!("Check out this job: {}", page);

        Ok(vec![
            ("Facebook", with_query("https://www.facebook.com/sharer/sharer.php", &[("u", page)])?),
            (
                "Twitter",
                with_query(
                    "https://twitter.com/intent/tweet",
                    &[("url", page), ("text", "Check out this job!")],
                )?,
            ),
            (
                "LinkedIn",
                with_query("https://www.linkedin.com/sharing/share-offsite/", &[("url", page)])?,
            ),
            ("WhatsApp", with_query("https://api.whatsapp.com/send", &[("text", message.as_str())])?),
            (
                "Email",
                format!(
                    "mailto:?{}",
                    url::form_urlencoded::Serializer::new(String::new())
                        .append_pair("subject", "Job Opportunity")
                        .append_pair("body", &email_body)
                        .finish()
                ),
            ),
        ])
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct JobDraft {
    pub title: String,
    pub description: String,
    pub department: String,
    pub jd_document_url: String,
    pub country: String,
    pub state: String,
    pub city: String,
    pub salary_range: String,
    pub experience_required: String,
    pub job_type: String,
    pub edu_qualifications: String,
    pub job_responsibilities: String,
    pub skills_required: String,
    pub status: String,
}

impl JobDraft {
    pub fn from_job(job: &Job) -> Self {
        let owned = |v: &Option<String>| v.clone().unwrap_or_default();
        Self {
            title: owned(&job.title),
            description: owned(&job.description),
            department: owned(&job.department),
            jd_document_url: owned(&job.jd_document_url),
            country: owned(&job.country),
            state: owned(&job.state),
            city: owned(&job.city),
            salary_range: job.salary().unwrap_or_default().to_string(),
            experience_required: job.experience().unwrap_or_default().to_string(),
            job_type: owned(&job.job_type),
            edu_qualifications: owned(&job.edu_qualifications),
            job_responsibilities: owned(&job.job_responsibilities),
            skills_required: owned(&job.skills_required),
            status: owned(&job.status),
        }
    }

    fn fields_mut(&mut self) -> [(&mut String, bool); 14] {
        [
            (&mut self.title, false),
            (&mut self.description, true),
            (&mut self.department, false),
            (&mut self.jd_document_url, false),
            (&mut self.country, false),
            (&mut self.state, false),
            (&mut self.city, false),
            (&mut self.salary_range, false),
            (&mut self.experience_required, false),
            (&mut self.job_type, false),
            (&mut self.edu_qualifications, false),
            (&mut self.job_responsibilities, true),
            (&mut self.skills_required, true),
            (&mut self.status, false),
        ]
    }

    /// Plain fields lose all markup; rich-text fields keep the formatting whitelist.
    pub fn sanitized(&self) -> Self {
        let mut draft = self.clone();
        for (field, rich) in draft.fields_mut() {
            *field = if rich {
                html::sanitize_rich(field)
            } else {
                html::sanitize_plain(field)
            };
        }
        draft
    }

    /// Form sent by the edit page: paragraph wrappers removed from every field.
    pub fn without_paragraph_tags(&self) -> Self {
        let mut draft = self.clone();
        for (field, _) in draft.fields_mut() {
            *field = html::strip_paragraph_tags(field);
        }
        draft
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Candidate {
    #[serde(default, deserialize_with = "lenient")]
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub phone_number: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub resume_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Applicant {
    #[serde(default, deserialize_with = "lenient")]
    pub job_title: Option<String>,
    #[serde(default)]
    pub candidate: Option<Candidate>,
}

impl Applicant {
    fn candidate_field(&self, f: impl Fn(&Candidate) -> &Option<String>) -> &str {
        self.candidate
            .as_ref()
            .and_then(|c| non_empty(f(c)))
            .unwrap_or("N/A")
    }

    pub fn name(&self) -> &str {
        self.candidate_field(|c| &c.full_name)
    }

    pub fn email(&self) -> &str {
        self.candidate_field(|c| &c.email)
    }

    pub fn phone(&self) -> &str {
        self.candidate_field(|c| &c.phone_number)
    }

    pub fn job_title(&self) -> &str {
        non_empty(&self.job_title).unwrap_or("N/A")
    }

    pub fn resume_url(&self) -> Option<&str> {
        self.candidate.as_ref().and_then(|c| non_empty(&c.resume_url))
    }
}
