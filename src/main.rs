mod api;
mod config;
mod error;
mod filters;
mod html;
mod listing;
mod models;
mod session;
mod tui;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use api::PortalClient;
use config::{parse_base_url, Config};
use filters::{FacetKey, FilterState};
use listing::ListingController;
use models::{Job, JobDraft};
use session::Session;

#[derive(Parser)]
#[command(name = "portal")]
#[command(about = "Job portal client - browse, post and manage job listings")]
struct Cli {
    /// Base URL of the job-portal API
    #[arg(long, global = true, env = "PORTAL_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and remember the token
    Login {
        /// Account email
        #[arg(short, long)]
        email: String,

        /// Password (prompted when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Forget the stored token
    Logout,

    /// List one page of jobs
    Jobs {
        #[command(flatten)]
        filters: FilterArgs,

        /// Page number (1-based)
        #[arg(long, default_value = "1")]
        page: usize,

        /// Print the page as JSON
        #[arg(long)]
        json: bool,
    },

    /// Browse jobs interactively
    Browse {
        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Show job details
    Show {
        /// Job ID
        id: String,

        /// Print the job as JSON
        #[arg(long)]
        json: bool,
    },

    /// Edit an existing job
    Edit {
        /// Job ID
        id: String,

        #[command(flatten)]
        fields: JobFields,
    },

    /// Post a new job
    Post {
        /// JSON file with the job fields
        #[arg(long)]
        from_file: Option<PathBuf>,

        /// JD document to upload (.pdf, .doc, .docx)
        #[arg(long)]
        document: Option<PathBuf>,

        #[command(flatten)]
        fields: JobFields,
    },

    /// List applicants
    Applicants,

    /// Print share links for a job
    Share {
        /// Job ID
        id: String,
    },
}

#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// Shareable query string, e.g. "cities=Pune&jobTypes=Full-Time"
    #[arg(long)]
    query: Option<String>,

    /// Filter by city (repeatable)
    #[arg(long = "city")]
    cities: Vec<String>,

    /// Filter by department (repeatable)
    #[arg(long = "department")]
    departments: Vec<String>,

    /// Filter by job type (repeatable)
    #[arg(long = "job-type")]
    job_types: Vec<String>,

    /// Filter by experience (repeatable)
    #[arg(long = "experience")]
    experiences: Vec<String>,

    /// Filter by salary (repeatable)
    #[arg(long = "salary")]
    salaries: Vec<String>,
}

impl FilterArgs {
    fn to_state(&self) -> FilterState {
        let mut state = FilterState::from_query(self.query.as_deref().unwrap_or_default());
        let flags = [
            (FacetKey::Cities, &self.cities),
            (FacetKey::Departments, &self.departments),
            (FacetKey::JobTypes, &self.job_types),
            (FacetKey::Experiences, &self.experiences),
            (FacetKey::Salaries, &self.salaries),
        ];
        for (key, values) in flags {
            for value in values {
                state.insert(key, value.clone());
            }
        }
        state
    }
}

#[derive(Args, Debug, Default)]
struct JobFields {
    #[arg(long)]
    title: Option<String>,

    /// Rich-text description (HTML allowed)
    #[arg(long)]
    description: Option<String>,

    #[arg(long)]
    department: Option<String>,

    #[arg(long)]
    city: Option<String>,

    #[arg(long)]
    state: Option<String>,

    #[arg(long)]
    country: Option<String>,

    #[arg(long = "salary-range")]
    salary_range: Option<String>,

    #[arg(long = "experience")]
    experience_required: Option<String>,

    #[arg(long = "job-type", value_parser = ["Full-Time", "Part-Time", "Contract", "Internship"])]
    job_type: Option<String>,

    #[arg(long = "education")]
    edu_qualifications: Option<String>,

    /// Rich-text responsibilities (HTML allowed)
    #[arg(long)]
    responsibilities: Option<String>,

    /// Rich-text skills (HTML allowed)
    #[arg(long)]
    skills: Option<String>,

    #[arg(long, value_parser = ["Open", "Closed"])]
    status: Option<String>,

    /// URL of an already uploaded JD document
    #[arg(long = "jd-url")]
    jd_document_url: Option<String>,
}

impl JobFields {
    /// Copies every given flag into `draft`. Returns whether anything changed.
    fn apply(self, draft: &mut JobDraft) -> bool {
        let updates = [
            (self.title, &mut draft.title),
            (self.description, &mut draft.description),
            (self.department, &mut draft.department),
            (self.city, &mut draft.city),
            (self.state, &mut draft.state),
            (self.country, &mut draft.country),
            (self.salary_range, &mut draft.salary_range),
            (self.experience_required, &mut draft.experience_required),
            (self.job_type, &mut draft.job_type),
            (self.edu_qualifications, &mut draft.edu_qualifications),
            (self.responsibilities, &mut draft.job_responsibilities),
            (self.skills, &mut draft.skills_required),
            (self.status, &mut draft.status),
            (self.jd_document_url, &mut draft.jd_document_url),
        ];

        let mut changed = false;
        for (value, field) in updates {
            if let Some(value) = value {
                *field = value;
                changed = true;
            }
        }
        changed
    }
}

fn init_tracing(config: &Config, log_file: Option<std::fs::File>) {
    let filter = EnvFilter::try_new(&config.rust_log).unwrap_or_else(|_| EnvFilter::new("portal=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    match log_file {
        Some(file) => builder.with_writer(Mutex::new(file)).with_ansi(false).init(),
        None => builder.with_writer(io::stderr).init(),
    }
}

fn prompt_password() -> Result<String> {
    print!("Password: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(api_url) = &cli.api_url {
        config.api_url = parse_base_url(api_url).context("--api-url must be a valid URL")?;
    }

    let store = config.session_store();
    let log_file = match &cli.command {
        Commands::Browse { .. } => {
            std::fs::create_dir_all(store.dir())?;
            Some(std::fs::File::create(store.dir().join("portal.log"))?)
        }
        _ => None,
    };
    init_tracing(&config, log_file);

    let session = store.load()?;
    let client = PortalClient::new(config.api_url.clone());

    match cli.command {
        Commands::Login { email, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password()?,
            };
            let token = client.login(&email, &password).await?;
            store.save(&token)?;
            info!("Stored auth token at {}", store.path().display());
            println!("Logged in successfully!");
        }

        Commands::Logout => {
            if store.clear()? {
                println!("Logged out.");
            } else {
                println!("Not logged in.");
            }
        }

        Commands::Jobs { filters, page, json } => {
            let mut controller = ListingController::from_query(session, &filters.to_state().to_query());
            controller.fetch_jobs(&client).await;
            controller.set_page(page);

            if json {
                println!("{}", serde_json::to_string_pretty(controller.page_jobs())?);
            } else {
                print_listing(&controller, &config)?;
            }
        }

        Commands::Browse { filters } => {
            let controller = ListingController::from_query(session, &filters.to_state().to_query());
            let runtime = tokio::runtime::Handle::current();
            let query = tokio::task::block_in_place(|| tui::run_browse(runtime, client, controller, &config))?;
            println!("{}", config.listing_url(&query)?);
        }

        Commands::Show { id, json } => {
            let token = session.require_token()?;
            let job = client
                .get_job(&id, token)
                .await
                .context("Failed to load job data")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&job)?);
            } else {
                print_job(&job);
            }
        }

        Commands::Edit { id, fields } => {
            let Some(token) = session.token() else {
                bail!("You must be logged in to edit this job.");
            };
            let job = client
                .get_job(&id, token)
                .await
                .context("Failed to load job data")?;

            let mut draft = JobDraft::from_job(&job);
            if !fields.apply(&mut draft) {
                println!("Nothing to update.");
                return Ok(());
            }

            client
                .update_job(&id, &draft, token)
                .await
                .context("Failed to update job. Please try again.")?;
            println!("Job details updated successfully!");
        }

        Commands::Post {
            from_file,
            document,
            fields,
        } => {
            let Some(token) = session.token() else {
                bail!("Authentication required. Please log in.");
            };

            let mut draft = match from_file {
                Some(path) => {
                    let content = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read job file: {}", path.display()))?;
                    serde_json::from_str::<JobDraft>(&content)
                        .with_context(|| format!("Invalid job file: {}", path.display()))?
                }
                None => JobDraft::default(),
            };
            fields.apply(&mut draft);

            if let Some(path) = document {
                match client.upload_document(&path, token).await {
                    Ok(Some(url)) => {
                        info!("Uploaded JD document to {}", url);
                        draft.jd_document_url = url;
                    }
                    Ok(None) => info!("Upload response carried no fileUrl"),
                    Err(e) => error!("Upload error: {}", e),
                }
            }

            client.post_job(&draft, token).await?;
            println!("Job posted successfully!");
        }

        Commands::Applicants => {
            let token = session.require_token()?;
            let applicants = client
                .list_applicants(token)
                .await
                .context("Failed to load applicants.")?;

            println!("Total Applicants: {}", applicants.len());
            if applicants.is_empty() {
                println!("No applicants found");
            } else {
                println!("{:<20} {:<28} {:<14} {:<24} {:<30}", "NAME", "EMAIL", "PHONE", "JOB APPLIED", "RESUME");
                println!("{}", "-".repeat(120));
                for applicant in &applicants {
                    println!(
                        "{:<20} {:<28} {:<14} {:<24} {:<30}",
                        truncate(applicant.name(), 18),
                        truncate(applicant.email(), 26),
                        truncate(applicant.phone(), 12),
                        truncate(applicant.job_title(), 22),
                        applicant.resume_url().unwrap_or("Not Available")
                    );
                }
            }
        }

        Commands::Share { id } => {
            let job = Job {
                id: Some(id),
                ..Job::default()
            };
            println!("Link: {}", job.page_url(&config.web_url)?);
            for (name, url) in job.share_links(&config.web_url)? {
                println!("{:<9} {}", name, url);
            }
        }
    }

    Ok(())
}

fn print_listing(controller: &ListingController, config: &Config) -> Result<()> {
    let applied = controller.applied();
    for key in FacetKey::ALL {
        let options = controller.options().get(key);
        if options.is_empty() {
            continue;
        }
        let rendered: Vec<String> = options
            .iter()
            .map(|o| if applied.contains(key, o) { format!("[{}]", o) } else { o.clone() })
            .collect();
        println!("{:<11} {}", format!("{}:", key.label()), rendered.join(", "));
    }
    println!();

    let jobs = controller.page_jobs();
    if jobs.is_empty() {
        println!("No jobs available");
    } else {
        println!(
            "{:<8} {:<30} {:<12} {:<14} {:<16} {:<20}",
            "ID", "TITLE", "TYPE", "EXPERIENCE", "SALARY", "LOCATION"
        );
        println!("{}", "-".repeat(105));
        for job in jobs {
            println!(
                "{:<8} {:<30} {:<12} {:<14} {:<16} {:<20}",
                truncate(job.id(), 8),
                truncate(&job.display_title(), 28),
                truncate(job.job_type.as_deref().unwrap_or_default(), 12),
                truncate(job.experience().unwrap_or_default(), 14),
                truncate(job.salary().unwrap_or("Not Disclosed"), 16),
                truncate(&job.location(), 20)
            );
        }
    }

    println!("\nPage {} of {}", controller.current_page(), controller.total_pages());
    println!("Link: {}", config.listing_url(&controller.query_string())?);
    Ok(())
}

fn print_job(job: &Job) {
    println!("Job #{}", job.id());
    println!("Title: {}", job.display_title());
    let facts = [
        ("Job Type", job.job_type.as_deref()),
        ("Department", job.department.as_deref()),
        ("Experience", job.experience()),
        ("Salary", Some(job.salary().unwrap_or("Not Disclosed"))),
        ("City", job.city.as_deref()),
        ("State", job.state.as_deref()),
        ("Country", job.country.as_deref()),
        ("Status", job.status.as_deref()),
        ("JD Document", job.jd_document_url.as_deref()),
    ];
    for (label, value) in facts {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            println!("{}: {}", label, value);
        }
    }

    let sections = [
        ("Job Description", &job.description),
        ("Job Responsibilities", &job.job_responsibilities),
        ("Skills Required", &job.skills_required),
        ("Educational Qualifications", &job.edu_qualifications),
    ];
    for (heading, body) in sections {
        let text = html::to_plain_text(body.as_deref().unwrap_or_default());
        if !text.is_empty() {
            println!("\n--- {} ---\n{}", heading, text);
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_args_merge_query_and_flags() {
        let args = FilterArgs {
            query: Some("cities=Pune".to_string()),
            cities: vec!["Mumbai".to_string()],
            job_types: vec!["Full-Time".to_string()],
            ..FilterArgs::default()
        };
        let state = args.to_state();
        assert!(state.contains(FacetKey::Cities, "Pune"));
        assert!(state.contains(FacetKey::Cities, "Mumbai"));
        assert!(state.contains(FacetKey::JobTypes, "Full-Time"));
        assert_eq!(state.len(), 3);
    }

    #[test]
    fn test_job_fields_apply() {
        let mut draft = JobDraft {
            title: "Old".to_string(),
            city: "Pune".to_string(),
            ..JobDraft::default()
        };
        let fields = JobFields {
            title: Some("New".to_string()),
            skills: Some("<ul><li>Rust</li></ul>".to_string()),
            ..JobFields::default()
        };
        assert!(fields.apply(&mut draft));
        assert_eq!(draft.title, "New");
        assert_eq!(draft.city, "Pune");
        assert_eq!(draft.skills_required, "<ul><li>Rust</li></ul>");

        assert!(!JobFields::default().apply(&mut draft));
    }

    #[test]
    fn test_cli_parses_repeated_filters() {
        let cli = Cli::try_parse_from([
            "portal", "jobs", "--city", "Pune", "--city", "Mumbai", "--job-type", "Contract", "--page", "2",
        ])
        .unwrap();
        match cli.command {
            Commands::Jobs { filters, page, json } => {
                assert_eq!(filters.cities, ["Pune", "Mumbai"]);
                assert_eq!(filters.job_types, ["Contract"]);
                assert_eq!(page, 2);
                assert!(!json);
            }
            _ => panic!("expected jobs command"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_status() {
        assert!(Cli::try_parse_from(["portal", "edit", "7", "--status", "Paused"]).is_err());
        assert!(Cli::try_parse_from(["portal", "edit", "7", "--status", "Closed"]).is_ok());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Senior Backend Engineer", 10), "Senior ...");
        assert_eq!(truncate("पुणे महाराष्ट्र", 6), "पुण...");
    }
}
