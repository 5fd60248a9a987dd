//! Page driver capability
//!
//! The engine never talks to a browser directly. A [`DriverFactory`] hands out
//! one isolated [`PageDriver`] per scenario attempt (own browsing context,
//! session and cookies), and the engine only uses the narrow calls below.
//!
//! Driver calls are single probes: they answer for the page as it is right
//! now. Bounded waiting lives in the engine (see [`crate::wait`]).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DriverError;
use crate::scenario::ElementRef;

/// Opaque reference to an element resolved by a driver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle(pub String);

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

/// Region whose visible text is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextScope<'a> {
    Page,
    Element(&'a ElementHandle),
}

/// Browser automation capability for one isolated browsing context.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Open `url` and return once the page reports load completion.
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    /// Resolve an element by role and accessible name.
    ///
    /// Returns [`DriverError::NotFound`] when nothing currently matches.
    async fn find_by_role(&self, target: &ElementRef) -> Result<ElementHandle, DriverError>;

    async fn fill(&self, element: &ElementHandle, text: &str) -> Result<(), DriverError>;

    async fn click(&self, element: &ElementHandle) -> Result<(), DriverError>;

    async fn select_option(&self, element: &ElementHandle, option: &str) -> Result<(), DriverError>;

    async fn is_visible(&self, element: &ElementHandle) -> Result<bool, DriverError>;

    async fn text_content(&self, scope: TextScope<'_>) -> Result<String, DriverError>;

    /// All elements matching a CSS-style selector.
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>, DriverError>;

    /// Release the browsing context. Called once per attempt.
    async fn close(&self) -> Result<(), DriverError> {
        Ok(())
    }
}

/// Produces fresh, isolated driver instances.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn PageDriver>, DriverError>;
}
