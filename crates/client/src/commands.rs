//! Command handlers: validate input, call the access layer, print results.
//!
//! Local state is only touched after the service confirms a change.

use std::sync::Arc;

use anyhow::{bail, Result};
use stringr::config::Config;
use stringr::{AuthSession, AuthState, Backend, FileAuthStore};
use stringr_shared::search::filter_strings;
use stringr_shared::stringing::{format_tension, job_label, string_label};
use stringr_shared::validation::{
    RacquetForm, RegisterForm, SessionForm, StringForm, StringJobForm,
};
use stringr_shared::{Racquet, Record, TennisString};

use crate::{
    ConfigAction, JobAction, PageArgs, RacquetAction, RacquetFields, SessionAction, StringAction,
};

/// How many strings the browser loads before filtering locally
const STRING_BROWSER_PAGE: u32 = 200;

pub struct App {
    pub session: Arc<AuthSession>,
}

impl App {
    pub fn start(backend_flag: Option<&str>) -> Result<Self> {
        let config = Config::load().unwrap_or_default();
        let url = config.backend_url(backend_flag);
        tracing::debug!("Using backend {}", url);

        let backend = Backend::new(&url)?;
        let store = FileAuthStore::new(config.auth_file()?);
        let session = AuthSession::start(backend, Arc::new(store));
        Ok(Self { session })
    }

    fn backend(&self) -> &Backend {
        self.session.backend()
    }

    /// The signed-in user's id, or a hint to log in
    async fn require_user(&self) -> Result<String> {
        self.session.ready().await;
        match self.session.current_user() {
            Some(user) if self.session.is_authenticated() => Ok(user.id),
            Some(_) => bail!("Session expired. Run 'stringr login' to sign in again."),
            None => bail!("Not logged in. Run 'stringr login' to authenticate."),
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        self.session.ready().await;
        match self.session.login(email, password).await {
            Ok(user) => {
                println!("\x1b[1;32m✅ Login successful!\x1b[0m");
                println!("\x1b[90mSigned in as {}\x1b[0m", user.email);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Login failed: {}", e);
                bail!("Login failed: invalid email or password")
            }
        }
    }

    pub async fn register(
        &self,
        name: String,
        email: String,
        password: String,
        confirm_password: String,
    ) -> Result<()> {
        let form = RegisterForm {
            name,
            email,
            password,
            confirm_password,
        };
        let user = self.session.register(&form).await?;
        println!("\x1b[32m✅ Account created for {}. Please sign in.\x1b[0m", user.email);
        Ok(())
    }

    pub async fn logout(&self) -> Result<()> {
        self.session.ready().await;
        self.session.logout().await;
        println!("\x1b[32m✅ Logged out successfully\x1b[0m");
        Ok(())
    }

    pub async fn whoami(&self) -> Result<()> {
        let state = self.session.ready().await;
        match state {
            AuthState::Authenticated { user, .. } if self.session.is_authenticated() => {
                println!("\x1b[32m✓ Logged in\x1b[0m");
                println!("Email: {}", user.email);
                if let Some(name) = &user.name {
                    println!("Name: {}", name);
                }
            }
            AuthState::Authenticated { .. } => {
                println!("\x1b[33m✗ Session expired\x1b[0m");
                println!("Run '\x1b[1mstringr login\x1b[0m' to sign in again");
            }
            _ => {
                println!("\x1b[33m✗ Not logged in\x1b[0m");
                println!("Run '\x1b[1mstringr login\x1b[0m' to authenticate");
            }
        }
        println!("Backend: {}", self.backend().base_url());
        Ok(())
    }

    pub async fn racquets(&self, action: RacquetAction) -> Result<()> {
        let user = self.require_user().await?;
        match action {
            RacquetAction::List { page } => {
                let (page, per_page) = page_of::<Racquet>(&page);
                let result = self.backend().racquets().list(page, per_page).await?;
                if result.is_empty() {
                    println!("No racquets yet. Add one with 'stringr racquets add --name ...'");
                }
                for racquet in &result.items {
                    print_racquet_line(racquet);
                }
                print_page_footer(result.page, result.total_pages, result.total_items);
            }
            RacquetAction::Show { id } => {
                let overview = self.backend().racquet_overview(&id).await?;
                print_racquet_line(&overview.racquet);
                if let Some(notes) = &overview.racquet.notes {
                    println!("  Notes: {}", notes);
                }
                match overview.current_string_job() {
                    Some(job) => {
                        println!("  Current stringing: {}", job_label(job));
                        println!(
                            "    Tension: {}",
                            format_tension(job.tension_lbs_main, job.tension_lbs_cross)
                        );
                        if let Some(created) = job.created {
                            println!("    Strung: {}", created.format("%Y-%m-%d"));
                        }
                    }
                    None => println!("  No string jobs yet"),
                }
                println!("  String jobs ({}):", overview.string_jobs.len());
                for job in &overview.string_jobs {
                    println!("    [{}] {}", job.id, job_label(job));
                    for session in overview.sessions_for(&job.id) {
                        println!("      {}", session_line(session));
                    }
                }
            }
            RacquetAction::Add { fields } => {
                let form = racquet_form(&fields, None);
                let draft = form.to_new(Some(user))?;
                let racquet = self.backend().racquets().create(&draft).await?;
                println!("\x1b[32m✅ Racquet created successfully\x1b[0m [{}]", racquet.id);
            }
            RacquetAction::Edit { id, fields } => {
                let existing = self.backend().racquets().get(&id).await?;
                let patch = racquet_form(&fields, Some(&existing)).to_patch()?;
                self.backend().racquets().update(&id, &patch).await?;
                println!("\x1b[32m✅ Racquet updated successfully\x1b[0m");
            }
            RacquetAction::Delete { id, yes } => {
                confirm(yes, "racquet")?;
                self.backend().racquets().delete(&id).await?;
                println!("\x1b[32m✅ Racquet deleted successfully\x1b[0m");
            }
        }
        Ok(())
    }

    pub async fn strings(&self, action: StringAction) -> Result<()> {
        let user = self.require_user().await?;
        match action {
            StringAction::List { query, page } => {
                let per_page = page.per_page.unwrap_or(STRING_BROWSER_PAGE);
                let result = self.backend().strings().list(page.page, per_page).await?;
                let shown = filter_strings(query.as_deref().unwrap_or(""), &result.items);
                for string in &shown {
                    print_string_line(string);
                }
                let plural = if shown.len() == 1 { "" } else { "s" };
                println!("{} string{} found", shown.len(), plural);
            }
            StringAction::Search { query } => {
                let result = self.backend().strings().search(&query).await?;
                for string in &result.items {
                    print_string_line(string);
                }
                println!("{} of {} matching strings", result.items.len(), result.total_items);
            }
            StringAction::Add { fields } => {
                let form = StringForm {
                    brand: fields.brand,
                    model: fields.model,
                    material: fields.material,
                    gauge: fields.gauge,
                    color: fields.color,
                    construction: fields.construction,
                    tension_range: fields.tension_range,
                    durability: fields.durability,
                    power: fields.power,
                    control: fields.control,
                    comfort: fields.comfort,
                    spin: fields.spin,
                    notes: fields.notes,
                };
                let draft = form.to_new(Some(user))?;
                let string = self.backend().strings().create(&draft).await?;
                println!(
                    "\x1b[32m✅ String added to database successfully\x1b[0m [{}]",
                    string.id
                );
            }
            StringAction::Delete { id, yes } => {
                confirm(yes, "string")?;
                self.backend().strings().delete(&id).await?;
                println!("\x1b[32m✅ String deleted successfully\x1b[0m");
            }
        }
        Ok(())
    }

    pub async fn jobs(&self, action: JobAction) -> Result<()> {
        let user = self.require_user().await?;
        match action {
            JobAction::List { page } => {
                let (page, per_page) = page_of::<stringr_shared::StringJob>(&page);
                let result = self.backend().string_jobs().list(page, per_page).await?;
                if result.is_empty() {
                    println!("No string jobs yet");
                }
                for job in &result.items {
                    let expand = job.expand.as_ref();
                    let racquet = expand
                        .and_then(|e| e.racquet.as_ref())
                        .map(|r| r.name.as_str())
                        .unwrap_or("Unknown Racquet");
                    println!("[{}] {}", job.id, racquet);
                    if let Some(main) = expand.and_then(|e| e.main_string.as_ref()) {
                        println!("  Main: {}", string_label(main));
                    }
                    if let Some(cross) = expand.and_then(|e| e.cross_string.as_ref()) {
                        println!("  Cross: {}", string_label(cross));
                    }
                    println!(
                        "  Tension: {}",
                        format_tension(job.tension_lbs_main, job.tension_lbs_cross)
                    );
                    if let Some(created) = job.created {
                        println!("  Strung on {}", created.format("%Y-%m-%d"));
                    }
                }
                print_page_footer(result.page, result.total_pages, result.total_items);
            }
            JobAction::Add {
                racquet,
                main_string,
                cross_string,
                tension_main,
                tension_cross,
            } => {
                let form = StringJobForm {
                    racquet,
                    main_string,
                    cross_string,
                    tension_main,
                    tension_cross,
                };
                let draft = form.to_new(Some(user))?;
                let job = self.backend().string_jobs().create(&draft).await?;
                println!("\x1b[32m✅ String job created successfully\x1b[0m [{}]", job.id);
            }
            JobAction::Delete { id, yes } => {
                confirm(yes, "string job")?;
                self.backend().string_jobs().delete(&id).await?;
                println!("\x1b[32m✅ String job deleted successfully\x1b[0m");
            }
        }
        Ok(())
    }

    pub async fn sessions(&self, action: SessionAction) -> Result<()> {
        let user = self.require_user().await?;
        match action {
            SessionAction::List { page } => {
                let (page, per_page) = page_of::<stringr_shared::Session>(&page);
                let result = self.backend().sessions().list(page, per_page).await?;
                if result.is_empty() {
                    println!("No sessions recorded yet");
                }
                for session in &result.items {
                    println!("[{}] {}", session.id, session_line(session));
                }
                print_page_footer(result.page, result.total_pages, result.total_items);
            }
            SessionAction::Add {
                string_job,
                duration_hours,
                rating,
                string_broken,
                notes,
            } => {
                let form = SessionForm {
                    string_job,
                    duration_hours,
                    rating,
                    string_broken,
                    notes,
                };
                let draft = form.to_new(Some(user))?;
                let session = self.backend().sessions().create(&draft).await?;
                println!("\x1b[32m✅ Session recorded successfully\x1b[0m [{}]", session.id);
            }
            SessionAction::Delete { id, yes } => {
                confirm(yes, "session")?;
                self.backend().sessions().delete(&id).await?;
                println!("\x1b[32m✅ Session deleted successfully\x1b[0m");
            }
        }
        Ok(())
    }
}

pub fn config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Set { key, value } => {
            let mut config = Config::load().unwrap_or_default();
            match key.as_str() {
                "backend" => config.backend.url = Some(value),
                "auth_file" => config.storage.auth_file = Some(value.into()),
                _ => bail!("Unknown config key: {}. Valid keys: backend, auth_file", key),
            }
            config.save()?;
            println!("Configuration saved");
        }
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = match key.as_str() {
                "backend" => config.backend.url.unwrap_or_default(),
                "auth_file" => config.auth_file()?.display().to_string(),
                _ => bail!("Unknown config key: {}", key),
            };
            println!("{}", value);
        }
        ConfigAction::Show => {
            let config = Config::load()?;
            println!("backend: {}", config.backend_url(None));
            println!("auth_file: {}", config.auth_file()?.display());
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

fn page_of<R: Record>(args: &PageArgs) -> (u32, u32) {
    (args.page, args.per_page.unwrap_or(R::DEFAULT_PER_PAGE))
}

fn confirm(yes: bool, what: &str) -> Result<()> {
    if !yes {
        bail!("Refusing to delete this {} without --yes", what);
    }
    Ok(())
}

/// Form pre-filled from the stored racquet, overridden by given flags
fn racquet_form(fields: &RacquetFields, existing: Option<&Racquet>) -> RacquetForm {
    let pick = |given: &Option<String>, stored: Option<&str>| {
        given
            .clone()
            .or_else(|| stored.map(str::to_string))
            .unwrap_or_default()
    };
    RacquetForm {
        name: pick(&fields.name, existing.map(|r| r.name.as_str())),
        brand: pick(&fields.brand, existing.and_then(|r| r.brand.as_deref())),
        model: pick(&fields.model, existing.and_then(|r| r.model.as_deref())),
        pattern: pick(&fields.pattern, existing.and_then(|r| r.pattern.as_deref())),
        weight: pick(&fields.weight, existing.and_then(|r| r.weight.as_deref())),
        year: fields
            .year
            .clone()
            .or_else(|| existing.and_then(|r| r.year).map(|y| y.to_string()))
            .unwrap_or_default(),
        notes: pick(&fields.notes, existing.and_then(|r| r.notes.as_deref())),
    }
}

fn print_racquet_line(racquet: &Racquet) {
    println!("[{}] \x1b[1m{}\x1b[0m", racquet.id, racquet.name);
    let make: Vec<&str> = [racquet.brand.as_deref(), racquet.model.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    if !make.is_empty() {
        println!("  {}", make.join(" "));
    }
    let mut details = Vec::new();
    if let Some(pattern) = &racquet.pattern {
        details.push(format!("Pattern: {}", pattern));
    }
    if let Some(weight) = &racquet.weight {
        details.push(format!("Weight: {}", weight));
    }
    if let Some(year) = racquet.year {
        details.push(format!("Year: {}", year));
    }
    if !details.is_empty() {
        println!("  {}", details.join(" | "));
    }
}

fn print_string_line(string: &TennisString) {
    let label = string_label(string);
    let label = if label.is_empty() { "Unknown String".to_string() } else { label };
    match &string.material {
        Some(material) => println!("[{}] {} ({})", string.id, label, material),
        None => println!("[{}] {}", string.id, label),
    }
}

fn session_line(session: &stringr_shared::Session) -> String {
    let mut parts = Vec::new();
    if let Some(created) = session.created {
        parts.push(format!("Session - {}", created.format("%Y-%m-%d")));
    }
    if let Some(hours) = session.duration_hours {
        parts.push(format!("Duration: {} hours", hours));
    }
    if let Some(rating) = session.rating {
        parts.push(format!("Rating: {}/10", rating));
    }
    if session.string_broken == Some(true) {
        parts.push("String broken".to_string());
    }
    parts.join(" | ")
}

fn print_page_footer(page: u32, total_pages: u32, total_items: u64) {
    if total_pages > 1 {
        println!("\x1b[90mPage {} of {} ({} total)\x1b[0m", page, total_pages, total_items);
    }
}
