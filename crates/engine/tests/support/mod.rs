//! In-memory registration site driven through the page driver interface
//!
//! Every `open()` starts an independent session (own page, own login) while
//! the account store is shared, like a real web shop. Rendering can be
//! deferred, and transport faults, hangs and panics can be injected.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use formflow_engine::{DriverError, DriverFactory, ElementHandle, ElementRef, PageDriver, TextScope};

pub const BASE_URL: &str = "https://shop.test";

const FIELDS: [&str; 5] = [
    "First name:",
    "Last name:",
    "Email:",
    "Password:",
    "Confirm password:",
];

#[derive(Default)]
struct SiteState {
    accounts: Mutex<HashSet<String>>,
    visited: Mutex<Vec<String>>,
    render_delay: Mutex<Duration>,
    fail_opens: Mutex<usize>,
    fail_clicks: Mutex<usize>,
    hang_navigation: Mutex<bool>,
    panic_on_fill: Mutex<Option<String>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
    active: AtomicUsize,
    peak_active: AtomicUsize,
}

/// Shared site; also the driver factory handed to the runner.
#[derive(Clone, Default)]
pub struct Site {
    state: Arc<SiteState>,
}

impl Site {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factory(&self) -> Arc<dyn DriverFactory> {
        Arc::new(self.clone())
    }

    pub fn add_account(&self, email: &str) {
        self.state.accounts.lock().insert(email.to_string());
    }

    pub fn accounts(&self) -> HashSet<String> {
        self.state.accounts.lock().clone()
    }

    pub fn visited(&self) -> Vec<String> {
        self.state.visited.lock().clone()
    }

    /// Pages render this long after a navigation or form submission.
    pub fn set_render_delay(&self, delay: Duration) {
        *self.state.render_delay.lock() = delay;
    }

    /// The next `n` driver launches fail.
    pub fn fail_next_opens(&self, n: usize) {
        *self.state.fail_opens.lock() = n;
    }

    /// The next `n` clicks fail with a transport error.
    pub fn fail_next_clicks(&self, n: usize) {
        *self.state.fail_clicks.lock() = n;
    }

    /// Navigation never completes.
    pub fn hang_navigation(&self) {
        *self.state.hang_navigation.lock() = true;
    }

    pub fn resume_navigation(&self) {
        *self.state.hang_navigation.lock() = false;
    }

    /// Filling a field with `value` panics inside the driver.
    pub fn panic_on_fill(&self, value: &str) {
        *self.state.panic_on_fill.lock() = Some(value.to_string());
    }

    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> usize {
        self.state.active.load(Ordering::SeqCst)
    }

    pub fn peak_active(&self) -> usize {
        self.state.peak_active.load(Ordering::SeqCst)
    }
}

fn take_one(counter: &Mutex<usize>) -> bool {
    let mut remaining = counter.lock();
    if *remaining > 0 {
        *remaining -= 1;
        true
    } else {
        false
    }
}

#[async_trait]
impl DriverFactory for Site {
    async fn open(&self) -> Result<Box<dyn PageDriver>, DriverError> {
        if take_one(&self.state.fail_opens) {
            return Err(DriverError::Transport("browser failed to launch".into()));
        }

        self.state.opened.fetch_add(1, Ordering::SeqCst);
        let active = self.state.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.peak_active.fetch_max(active, Ordering::SeqCst);

        Ok(Box::new(Session {
            state: self.state.clone(),
            page: Mutex::new(Page::new()),
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Blank,
    Home,
    Register,
    Completed,
}

struct Page {
    view: View,
    gender: Option<String>,
    form: BTreeMap<String, String>,
    errors: Vec<String>,
    logged_in: Option<String>,
    ready_at: Instant,
}

impl Page {
    fn new() -> Self {
        Self {
            view: View::Blank,
            gender: None,
            form: BTreeMap::new(),
            errors: Vec::new(),
            logged_in: None,
            ready_at: Instant::now(),
        }
    }

    fn rendered(&self) -> bool {
        Instant::now() >= self.ready_at
    }

    fn show(&mut self, view: View, delay: Duration) {
        self.view = view;
        self.ready_at = Instant::now() + delay;
    }

    fn elements(&self) -> Vec<(&'static str, String)> {
        let mut elements = Vec::new();
        if self.view == View::Blank {
            return elements;
        }

        match &self.logged_in {
            Some(email) => {
                elements.push(("link", email.clone()));
                elements.push(("link", "Log out".to_string()));
            }
            None => {
                elements.push(("link", "Register".to_string()));
                elements.push(("link", "Log in".to_string()));
            }
        }

        match self.view {
            View::Register => {
                elements.push(("heading", "Register".to_string()));
                elements.push(("radio", "Male".to_string()));
                elements.push(("radio", "Female".to_string()));
                elements.extend(FIELDS.iter().map(|f| ("textbox", f.to_string())));
                elements.push(("button", "Register".to_string()));
                elements.extend(self.errors.iter().map(|e| ("alert", e.clone())));
            }
            View::Completed => {
                elements.push(("heading", "Register".to_string()));
                elements.push(("button", "Continue".to_string()));
            }
            View::Home => {
                elements.push(("heading", "Welcome to our store".to_string()));
            }
            View::Blank => {}
        }
        elements
    }

    fn text(&self) -> String {
        let mut lines: Vec<String> = self.elements().into_iter().map(|(_, name)| name).collect();
        match self.view {
            View::Register => {
                lines.push("Your Personal Details".into());
                lines.push("Your Password".into());
            }
            View::Completed => lines.push("Your registration completed".into()),
            _ => {}
        }
        lines.join("\n")
    }

    fn find(&self, handle: &ElementHandle) -> Option<(String, String)> {
        let (role, name) = handle.id().split_once(':')?;
        self.elements()
            .into_iter()
            .find(|(r, n)| *r == role && n == name)
            .map(|(r, n)| (r.to_string(), n))
    }

    fn field(&self, name: &str) -> String {
        self.form
            .get(name)
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    }

    /// Server-side validation of the registration form.
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let password = self.field("Password:");
        let confirm = self.field("Confirm password:");
        let email = self.field("Email:");

        if self.field("First name:").is_empty() {
            errors.push("First name is required.".to_string());
        }
        if self.field("Last name:").is_empty() {
            errors.push("Last name is required.".to_string());
        }
        if email.is_empty() {
            errors.push("Email is required.".to_string());
        } else if !valid_email(&email) {
            errors.push("Wrong email".to_string());
        }
        if password.is_empty() {
            errors.push("Password is required.".to_string());
        } else if password.len() < 6 {
            errors.push("The password should have at least 6 characters.".to_string());
        }
        if confirm.is_empty() {
            errors.push("Password is required.".to_string());
        } else if confirm != password {
            errors.push("The password and confirmation password do not match.".to_string());
        }
        errors
    }
}

fn valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && domain.split('.').all(|label| !label.is_empty())
        }
        None => false,
    }
}

/// One isolated browsing context.
pub struct Session {
    state: Arc<SiteState>,
    page: Mutex<Page>,
}

impl Session {
    fn delay(&self) -> Duration {
        *self.state.render_delay.lock()
    }

    fn submit(&self, page: &mut Page) {
        let mut errors = page.validate();
        let email = page.field("Email:");

        if errors.is_empty() && !self.state.accounts.lock().insert(email.clone()) {
            errors.push("The specified email already exists".to_string());
        }

        if errors.is_empty() {
            page.form.clear();
            page.errors.clear();
            page.logged_in = Some(email);
            page.show(View::Completed, self.delay());
        } else {
            page.errors = errors;
            page.show(View::Register, self.delay());
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.state.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PageDriver for Session {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        let hang = *self.state.hang_navigation.lock();
        if hang {
            std::future::pending::<()>().await;
        }
        self.state.visited.lock().push(url.to_string());

        let mut page = self.page.lock();
        page.form.clear();
        page.errors.clear();
        page.gender = None;
        let view = if url.trim_end_matches('/').ends_with("/register") {
            View::Register
        } else {
            View::Home
        };
        page.show(view, self.delay());
        Ok(())
    }

    async fn find_by_role(&self, target: &ElementRef) -> Result<ElementHandle, DriverError> {
        let page = self.page.lock();
        if !page.rendered() {
            return Err(DriverError::NotFound(target.to_string()));
        }
        page.elements()
            .into_iter()
            .find(|(role, name)| *role == target.role && target.matches_name(name))
            .map(|(role, name)| ElementHandle::new(format!("{role}:{name}")))
            .ok_or_else(|| DriverError::NotFound(target.to_string()))
    }

    async fn fill(&self, element: &ElementHandle, text: &str) -> Result<(), DriverError> {
        if self.state.panic_on_fill.lock().as_deref() == Some(text) {
            panic!("driver crashed while typing {text:?}");
        }

        let mut page = self.page.lock();
        match page.find(element) {
            Some((role, name)) if role == "textbox" => {
                page.form.insert(name, text.to_string());
                Ok(())
            }
            Some((role, _)) => Err(DriverError::Transport(format!("cannot fill a {role}"))),
            None => Err(DriverError::NotFound(element.id().to_string())),
        }
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), DriverError> {
        if take_one(&self.state.fail_clicks) {
            return Err(DriverError::Transport("connection reset by peer".into()));
        }

        let mut page = self.page.lock();
        let (role, name) = page
            .find(element)
            .ok_or_else(|| DriverError::NotFound(element.id().to_string()))?;

        match (role.as_str(), name.as_str()) {
            ("radio", gender) => page.gender = Some(gender.to_string()),
            ("button", "Register") => self.submit(&mut page),
            ("link", "Log out") => {
                page.logged_in = None;
                page.show(View::Home, self.delay());
            }
            ("link", "Register") => {
                page.form.clear();
                page.errors.clear();
                page.show(View::Register, self.delay());
            }
            _ => {}
        }
        Ok(())
    }

    async fn select_option(&self, element: &ElementHandle, _option: &str) -> Result<(), DriverError> {
        let page = self.page.lock();
        page.find(element)
            .map(|_| ())
            .ok_or_else(|| DriverError::NotFound(element.id().to_string()))
    }

    async fn is_visible(&self, element: &ElementHandle) -> Result<bool, DriverError> {
        let page = self.page.lock();
        if page.rendered() && page.find(element).is_some() {
            Ok(true)
        } else {
            Err(DriverError::NotFound(element.id().to_string()))
        }
    }

    async fn text_content(&self, scope: TextScope<'_>) -> Result<String, DriverError> {
        let page = self.page.lock();
        if !page.rendered() {
            return Ok(String::new());
        }
        match scope {
            TextScope::Page => Ok(page.text()),
            TextScope::Element(element) => page
                .find(element)
                .map(|(_, name)| name)
                .ok_or_else(|| DriverError::NotFound(element.id().to_string())),
        }
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>, DriverError> {
        let page = self.page.lock();
        if !page.rendered() || !(selector.contains("error") || selector.contains("alert")) {
            return Ok(Vec::new());
        }
        Ok((0..page.errors.len())
            .map(|i| ElementHandle::new(format!("error:{i}")))
            .collect())
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
