//! ViewStateController - the single authority over what is on screen.
//!
//! Every user action goes through this type. It checks the session,
//! delegates to the injected collaborators, and folds their results back
//! into [`ControllerState`]. Failures never escape as panics or stale
//! screens: each one lands in the `notice` slot (and, for auth failures,
//! raises the login prompt) and is also returned to the caller.
//!
//! # Locking
//!
//! State lives behind a `tokio::sync::RwLock` that is only held for
//! synchronous mutation, never across a collaborator call. Conversation
//! actions (`send_message`, `derive_story_from_conversation`) additionally
//! queue on a FIFO mutex so turns are appended in submission order.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};

use sentimental_core::auth::{AuthGateway, AuthUser, Credentials, ProviderIdentity, Registration};
use sentimental_core::config::ControllerConfig;
use sentimental_core::generation::{DerivedStory, GenerationService, Requester};
use sentimental_core::session::{ConversationMessage, Session, SessionStore};
use sentimental_core::story::{
    AudioUpload, ContentStore, FALLBACK_SUPPORTED_FORMATS, FormatPayload, NewStory, Story,
    StoryUpdate, VisibilityChange, extract_display_title,
};
use sentimental_core::{ErrorKind, Result, SentimentalError, View};

use crate::single_flight::SingleFlight;
use crate::view_state::{ControllerState, Notice, SelectedFormat};

pub const CHAT_ERROR_PLACEHOLDER: &str = "Sorry, I encountered an error. Please try again.";
pub const SIGN_IN_REQUIRED: &str = "Please sign in to continue.";
pub const SIGN_IN_TO_CREATE_FORMAT: &str = "This transformation has not been created yet. \
Please sign in to create new transformations.";
pub const OWNER_ONLY_FORMAT: &str = "Only the story author can create additional transformations.";
pub const FORMAT_GENERATION_FAILED: &str =
    "Sorry, we couldn't create this transformation. Please try again.";

const OWNER_ONLY_PRIVACY: &str = "Only the story author can change privacy settings.";
const OWNER_ONLY_EDIT: &str = "Only the story author can edit this story.";
const OWNER_ONLY_UPLOAD: &str = "Only the story author can upload audio.";
const INVALID_USER_ID: &str = "Invalid user ID received. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Upper bound on any single collaborator call.
    pub request_timeout: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from(&ControllerConfig::default())
    }
}

impl From<&ControllerConfig> for ControllerSettings {
    fn from(config: &ControllerConfig) -> Self {
        Self {
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

#[derive(Default)]
struct Inner {
    state: ControllerState,
    /// Bumped whenever the conversation buffer is cleared, so replies
    /// that were in flight at that moment can be recognised and dropped.
    conversation_epoch: u64,
}

impl Inner {
    fn clear_conversation(&mut self) {
        self.state.conversation.clear();
        self.conversation_epoch += 1;
    }

    /// Applies the navigation rules and returns the view actually shown.
    fn navigate(&mut self, target: View) -> View {
        let view = &self.state.view;
        let target = match target {
            View::StoryDetail if view.selected_story.is_none() => View::Discover,
            View::FormatDetail
                if view.selected_story.is_none() || view.selected_format.is_none() =>
            {
                View::Discover
            }
            other => other,
        };

        let current = view.current_view;
        if current == View::Share && target != View::Share {
            self.clear_conversation();
        }

        let view = &mut self.state.view;
        if current.is_tab() && current != target {
            // A story opened from a non-listing tab goes back to discover.
            let previous = if target == View::StoryDetail && !current.lists_stories() {
                View::Discover
            } else {
                current
            };
            view.previous_view = Some(previous);
        }
        if target.is_tab() {
            view.clear_selection();
        } else if target == View::StoryDetail {
            view.clear_format();
        }
        view.current_view = target;

        tracing::debug!("View {} -> {}", current, target);
        target
    }

    fn set_error(&mut self, err: &SentimentalError) {
        let kind = err.kind();
        if kind == ErrorKind::AuthRequired {
            self.state.login_prompt = true;
        }
        self.state.notice = Some(Notice::error(kind, err.message()));
    }

    /// Shows `payload` if `(story_id, format_type)` is still the open format.
    fn display_format(&mut self, story_id: &str, format_type: &str, payload: &FormatPayload) {
        let view = &mut self.state.view;
        let Some(selected) = view
            .selected_format
            .as_mut()
            .filter(|selected| selected.is(story_id, format_type))
        else {
            return;
        };

        let content = payload.content().to_string();
        selected.title = Some(
            payload
                .title()
                .map(str::to_string)
                .unwrap_or_else(|| extract_display_title(format_type, &content)),
        );
        selected.audio_url = payload.audio_url().map(str::to_string);
        view.format_content = Some(content);
    }

    fn show_format_message(&mut self, story_id: &str, format_type: &str, message: &str) {
        let view = &mut self.state.view;
        if view
            .selected_format
            .as_ref()
            .is_some_and(|selected| selected.is(story_id, format_type))
        {
            view.format_content = Some(message.to_string());
        }
    }
}

/// Application state machine for Sentimental.
pub struct ViewStateController {
    auth: Arc<dyn AuthGateway>,
    store: Arc<dyn ContentStore>,
    generation: Arc<dyn GenerationService>,
    sessions: Arc<dyn SessionStore>,
    settings: ControllerSettings,
    inner: RwLock<Inner>,
    conversation_gate: Mutex<()>,
    format_flights: SingleFlight<(String, String), Result<FormatPayload>>,
}

impl ViewStateController {
    pub fn new(
        auth: Arc<dyn AuthGateway>,
        store: Arc<dyn ContentStore>,
        generation: Arc<dyn GenerationService>,
        sessions: Arc<dyn SessionStore>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            auth,
            store,
            generation,
            sessions,
            settings,
            inner: RwLock::new(Inner::default()),
            conversation_gate: Mutex::new(()),
            format_flights: SingleFlight::new(),
        }
    }

    // ============================================================================
    // Read access
    // ============================================================================

    /// A copy of the full renderable state.
    pub async fn snapshot(&self) -> ControllerState {
        self.inner.read().await.state.clone()
    }

    pub async fn current_view(&self) -> View {
        self.inner.read().await.state.view.current_view
    }

    pub async fn session(&self) -> Option<Session> {
        self.inner.read().await.state.valid_session().cloned()
    }

    pub async fn conversation(&self) -> Vec<ConversationMessage> {
        self.inner.read().await.state.conversation.clone()
    }

    // ============================================================================
    // Internal helpers
    // ============================================================================

    /// Runs a collaborator call under the request timeout.
    async fn bounded<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.settings.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    "{} timed out after {:?}",
                    operation,
                    self.settings.request_timeout
                );
                Err(SentimentalError::network(format!(
                    "The request timed out ({operation}). Please try again."
                )))
            }
        }
    }

    /// Records `err` in the notice slot and hands it back.
    async fn fail<T>(&self, err: SentimentalError) -> Result<T> {
        tracing::warn!("[{}] {}", err.kind(), err);
        self.inner.write().await.set_error(&err);
        Err(err)
    }

    async fn info(&self, message: impl Into<String>) {
        self.inner.write().await.state.notice = Some(Notice::info(message));
    }

    /// Rejects a non-owner before any network call when the story is cached.
    async fn check_owner(&self, session: &Session, story_id: &str, message: &str) -> Result<()> {
        let owner = {
            let inner = self.inner.read().await;
            inner
                .state
                .find_story(story_id)
                .map(|s| s.owner_user_id.clone())
        };
        match owner {
            Some(owner) if !session.owns(&owner) => {
                self.fail(SentimentalError::access_denied(message)).await
            }
            _ => Ok(()),
        }
    }

    // ============================================================================
    // Navigation
    // ============================================================================

    /// Moves to `target`, applying the selection and buffer rules.
    ///
    /// Returns the view actually shown: a detail view without its
    /// selection falls back to `discover`.
    pub async fn navigate(&self, target: View) -> View {
        self.inner.write().await.navigate(target)
    }

    /// [`Self::navigate`] by view id; unknown ids land on `discover`.
    pub async fn navigate_to(&self, view_id: &str) -> View {
        self.navigate(View::parse(view_id)).await
    }

    /// Selects `story` and opens its detail view.
    pub async fn open_story(&self, story: &Story) -> View {
        let mut inner = self.inner.write().await;
        let latest = inner
            .state
            .find_story(&story.id)
            .cloned()
            .unwrap_or_else(|| story.clone());
        inner.state.view.selected_story = Some(latest);
        inner.navigate(View::StoryDetail)
    }

    /// `format-detail` goes back to its story, `story-detail` to the list
    /// it was opened from (`discover` when unknown). Tabs stay put.
    pub async fn back(&self) -> View {
        let mut inner = self.inner.write().await;
        let current = inner.state.view.current_view;
        let previous = inner.state.view.previous_view;
        match current {
            View::FormatDetail => inner.navigate(View::StoryDetail),
            View::StoryDetail => {
                inner.navigate(previous.filter(View::lists_stories).unwrap_or_default())
            }
            tab => tab,
        }
    }

    // ============================================================================
    // Session
    // ============================================================================

    /// The current session, or AUTH_REQUIRED with the login prompt raised.
    pub async fn require_session(&self) -> Result<Session> {
        let session = self.inner.read().await.state.valid_session().cloned();
        match session {
            Some(session) => Ok(session),
            None => {
                self.fail(SentimentalError::auth_required(SIGN_IN_REQUIRED))
                    .await
            }
        }
    }

    /// Startup: cached session, story lists, supported formats.
    ///
    /// Never fails; problems are logged and surfaced as notices.
    pub async fn initialize(&self) {
        match self.bounded("load session", self.sessions.load()).await {
            Ok(Some(session)) if session.is_valid() => {
                tracing::info!("Restored session for {}", session.id);
                self.inner.write().await.state.session = Some(session);
            }
            Ok(Some(session)) => {
                tracing::warn!("Discarding cached session with invalid id {:?}", session.id);
                if let Err(e) = self.bounded("clear session", self.sessions.clear()).await {
                    tracing::warn!("Failed to clear invalid session: {}", e);
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Failed to load cached session: {}", e),
        }

        if let Err(e) = self.refresh_stories().await {
            tracing::warn!("Initial story load failed: {}", e);
        }

        let supported = match self
            .bounded("supported formats", self.store.supported_formats())
            .await
        {
            Ok(formats) if !formats.is_empty() => formats,
            Ok(_) => fallback_formats(),
            Err(e) => {
                tracing::warn!("Using fallback format list: {}", e);
                fallback_formats()
            }
        };
        self.inner.write().await.state.supported_formats = supported;
    }

    pub async fn register(
        &self,
        email: &str,
        name: &str,
        password: Option<&str>,
    ) -> Result<Session> {
        let (email, name) = (email.trim(), name.trim());
        if email.is_empty() || name.is_empty() {
            return self
                .fail(SentimentalError::validation("Email and name are required"))
                .await;
        }

        let registration = Registration {
            email: email.to_string(),
            name: name.to_string(),
            password: password.filter(|p| !p.is_empty()).map(str::to_string),
        };
        match self.bounded("register", self.auth.register(registration)).await {
            Ok(user) => self.establish_session(user.into_session()).await,
            Err(e) => self.fail(e).await,
        }
    }

    pub async fn login(&self, email: &str, password: Option<&str>) -> Result<Session> {
        let email = email.trim();
        if email.is_empty() {
            return self
                .fail(SentimentalError::validation("Email is required"))
                .await;
        }

        let credentials = Credentials {
            email: email.to_string(),
            password: password.filter(|p| !p.is_empty()).map(str::to_string),
        };
        match self.bounded("login", self.auth.login(credentials)).await {
            Ok(user) => self.establish_session(user.into_session()).await,
            Err(e) => self.fail(e).await,
        }
    }

    /// Signs in with a provider identity.
    ///
    /// When the backend sync fails the session is built from the provider
    /// data alone.
    pub async fn sync_identity(&self, identity: ProviderIdentity) -> Result<Session> {
        let session = match self
            .bounded("identity sync", self.auth.sync_identity(identity.clone()))
            .await
        {
            Ok(AuthUser {
                user_id,
                email,
                name,
            }) => Session {
                id: user_id,
                display_name: name,
                email,
                avatar_url: identity.photo_url.clone(),
                email_verified: identity.email_verified,
            },
            Err(e) => {
                tracing::warn!("Identity sync failed, using provider data: {}", e);
                identity.to_session()
            }
        };
        self.establish_session(session).await
    }

    async fn establish_session(&self, session: Session) -> Result<Session> {
        if !session.is_valid() {
            return self
                .fail(SentimentalError::auth_required(INVALID_USER_ID))
                .await;
        }

        if let Err(e) = self.bounded("save session", self.sessions.save(&session)).await {
            tracing::warn!("Failed to persist session: {}", e);
        }

        {
            let mut inner = self.inner.write().await;
            inner.state.session = Some(session.clone());
            inner.state.login_prompt = false;
            inner.state.notice = None;
        }
        tracing::info!("Signed in as {}", session.id);

        if let Err(e) = self.refresh_stories().await {
            tracing::warn!("Story refresh after sign-in failed: {}", e);
        }
        Ok(session)
    }

    /// Ends the session and returns to `discover`.
    ///
    /// Provider sign-out is attempted only for non-demo sessions and its
    /// failure does not stop the local logout.
    pub async fn logout(&self) {
        let session = self.inner.read().await.state.session.clone();
        if let Some(session) = session.filter(|s| s.is_valid() && !s.is_demo()) {
            if let Err(e) = self.bounded("sign out", self.auth.sign_out(&session)).await {
                tracing::warn!("Provider sign-out failed: {}", e);
            }
        }

        if let Err(e) = self.bounded("clear session", self.sessions.clear()).await {
            tracing::warn!("Failed to clear cached session: {}", e);
        }

        let mut inner = self.inner.write().await;
        inner.state.session = None;
        inner.state.user_stories.clear();
        inner.state.login_prompt = false;
        inner.clear_conversation();
        inner.state.view.clear_selection();
        inner.navigate(View::Discover);
        tracing::info!("Signed out");
    }

    pub async fn dismiss_notice(&self) {
        self.inner.write().await.state.notice = None;
    }

    pub async fn dismiss_login_prompt(&self) {
        self.inner.write().await.state.login_prompt = false;
    }

    // ============================================================================
    // Conversation
    // ============================================================================

    /// Appends a user turn and the companion's reply.
    ///
    /// On generation failure the placeholder reply is appended instead and
    /// the error is returned. A reply that arrives after the buffer was
    /// cleared is discarded.
    pub async fn send_message(&self, text: &str) -> Result<String> {
        let _turn = self.conversation_gate.lock().await;
        let session = self.require_session().await?;

        let text = text.trim();
        if text.is_empty() {
            return self
                .fail(SentimentalError::validation("Message cannot be empty"))
                .await;
        }

        let (transcript, epoch) = {
            let mut inner = self.inner.write().await;
            inner
                .state
                .conversation
                .push(ConversationMessage::user(text));
            (inner.state.conversation.clone(), inner.conversation_epoch)
        };

        let result = self
            .bounded(
                "chat",
                self.generation.chat(&transcript, Requester::from(&session)),
            )
            .await;
        let reply = match &result {
            Ok(reply) => reply.clone(),
            Err(e) => {
                tracing::warn!("Chat failed: {}", e);
                CHAT_ERROR_PLACEHOLDER.to_string()
            }
        };

        {
            let mut inner = self.inner.write().await;
            if inner.conversation_epoch == epoch {
                inner
                    .state
                    .conversation
                    .push(ConversationMessage::assistant(reply.clone()));
            } else {
                tracing::debug!("Dropping reply for a cleared conversation");
            }
            if let Err(e) = &result {
                inner.set_error(e);
            }
        }

        result
    }

    /// Turns the conversation into a private story.
    ///
    /// An empty buffer is a no-op returning `Ok(None)`. The buffer is only
    /// cleared once both generation and the store have succeeded. `Ok(None)`
    /// is also returned when the generation service stored the story itself
    /// and it cannot be found in the refreshed list.
    pub async fn derive_story_from_conversation(&self) -> Result<Option<Story>> {
        let _turn = self.conversation_gate.lock().await;
        let session = self.require_session().await?;

        let conversation = self.conversation().await;
        if conversation.is_empty() {
            tracing::debug!("Nothing to derive: conversation is empty");
            return Ok(None);
        }

        let derived = match self
            .bounded(
                "derive story",
                self.generation
                    .derive_story(&conversation, Requester::from(&session)),
            )
            .await
        {
            Ok(derived) => derived,
            Err(e) => return self.fail(e).await,
        };

        // Stories the service stores itself are only known by id.
        let (created_id, new_story) = match derived {
            DerivedStory::Draft(draft) => {
                let new_story = NewStory {
                    title: draft.title,
                    content: draft.text,
                    conversation,
                    user_id: session.id.clone(),
                    author: session.display_name.clone(),
                    is_public: false,
                };
                match self
                    .bounded("create story", self.store.create_story(new_story.clone()))
                    .await
                {
                    Ok(created) => (Some(created.id), Some(new_story)),
                    Err(e) => return self.fail(e).await,
                }
            }
            DerivedStory::Stored { id } => (id, None),
        };
        tracing::info!(
            "Created story {}",
            created_id.as_deref().unwrap_or("(id not reported)")
        );

        let listed = match self
            .bounded("list stories", self.store.list_user_stories(&session.id))
            .await
        {
            Ok(stories) => Some(stories),
            Err(e) => {
                tracing::warn!("Story list refresh failed after create: {}", e);
                None
            }
        };

        let mut inner = self.inner.write().await;
        let known: Vec<String> = inner
            .state
            .user_stories
            .iter()
            .map(|s| s.id.clone())
            .collect();
        let mut user_stories: Vec<Story> = listed
            .map(|stories| stories.into_iter().map(Story::normalized).collect())
            .unwrap_or_else(|| inner.state.user_stories.clone());

        let listed_story = match &created_id {
            Some(id) => user_stories.iter().find(|s| &s.id == id).cloned(),
            None => user_stories
                .iter()
                .find(|s| !known.contains(&s.id))
                .cloned(),
        };
        let story = match (listed_story, created_id, new_story) {
            (Some(story), _, _) => Some(story),
            // Not visible yet (eventually consistent store); keep a local copy.
            (None, Some(id), Some(new_story)) => {
                let local = local_story(id, new_story);
                user_stories.insert(0, local.clone());
                Some(local)
            }
            _ => None,
        };

        inner.state.user_stories = user_stories;
        inner.clear_conversation();
        inner.state.view.clear_selection();
        inner.state.view.previous_view = Some(View::Share);
        inner.state.view.current_view = View::Stories;
        inner.state.notice = Some(Notice::info("Your story has been created."));

        Ok(story)
    }

    // ============================================================================
    // Stories
    // ============================================================================

    /// Reloads the public list and, when signed in, the user's own list.
    pub async fn refresh_stories(&self) -> Result<()> {
        let public = self
            .bounded("list public stories", self.store.list_public_stories())
            .await;
        let session = self.session().await;

        let mine = match &session {
            Some(session) => Some(
                self.bounded("list user stories", self.store.list_user_stories(&session.id))
                    .await,
            ),
            None => None,
        };

        let mut first_error = None;
        {
            let mut inner = self.inner.write().await;
            match public {
                Ok(stories) => {
                    inner.state.public_stories =
                        stories.into_iter().map(Story::normalized).collect();
                }
                Err(e) => first_error = Some(e),
            }
            match mine {
                Some(Ok(stories)) => {
                    inner.state.user_stories =
                        stories.into_iter().map(Story::normalized).collect();
                }
                Some(Err(e)) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                None => inner.state.user_stories.clear(),
            }
        }

        match first_error {
            Some(e) => self.fail(e).await,
            None => Ok(()),
        }
    }

    /// Flips a story's visibility.
    ///
    /// Only the owner may do this; the cache is untouched unless the store
    /// confirms the change.
    pub async fn toggle_story_privacy(
        &self,
        story_id: &str,
        current_is_public: bool,
    ) -> Result<VisibilityChange> {
        let session = self.require_session().await?;
        self.check_owner(&session, story_id, OWNER_ONLY_PRIVACY)
            .await?;

        let change = match self
            .bounded(
                "set visibility",
                self.store
                    .set_story_visibility(story_id, !current_is_public, &session.id),
            )
            .await
        {
            Ok(change) => change,
            Err(e) => return self.fail(e).await,
        };

        let mut inner = self.inner.write().await;
        let updated = inner
            .state
            .find_story(story_id)
            .map(|s| s.with_visibility(change.is_public));
        if let Some(updated) = updated {
            inner.state.replace_story(&updated);
            let public = &mut inner.state.public_stories;
            if updated.is_public {
                if !public.iter().any(|s| s.id == updated.id) {
                    public.insert(0, updated);
                }
            } else {
                public.retain(|s| s.id != updated.id);
            }
        }
        inner.state.notice = Some(Notice::info(change.message.clone()));

        Ok(change)
    }

    /// Owner edit of a story's title and content.
    pub async fn update_story(&self, story_id: &str, title: &str, content: &str) -> Result<Story> {
        let (title, content) = (title.trim(), content.trim());
        if title.is_empty() || content.is_empty() {
            return self
                .fail(SentimentalError::validation(
                    "Title and content cannot be empty",
                ))
                .await;
        }

        let session = self.require_session().await?;
        self.check_owner(&session, story_id, OWNER_ONLY_EDIT).await?;

        let update = StoryUpdate {
            title: Some(title.to_string()),
            content: Some(content.to_string()),
        };
        let updated = match self
            .bounded(
                "update story",
                self.store.update_story(story_id, update, &session.id),
            )
            .await
        {
            Ok(story) => story.normalized(),
            Err(e) => return self.fail(e).await,
        };

        let mut inner = self.inner.write().await;
        inner.state.replace_story(&updated);
        inner.state.notice = Some(Notice::info("Story updated."));
        Ok(updated)
    }

    // ============================================================================
    // Formats
    // ============================================================================

    /// Opens `format_type` of `story` in `format-detail`.
    ///
    /// Content is resolved in order: the cached story, the store, then (for
    /// the owner only) a fresh generation that is stored before display.
    /// Concurrent generations for the same story and format are coalesced.
    pub async fn view_format(&self, story: &Story, format_type: &str) -> Result<FormatPayload> {
        let story = {
            let mut inner = self.inner.write().await;
            let latest = inner
                .state
                .find_story(&story.id)
                .cloned()
                .unwrap_or_else(|| story.clone());
            inner.state.view.selected_story = Some(latest.clone());
            inner.state.view.selected_format = Some(SelectedFormat::new(&latest.id, format_type));
            inner.state.view.format_content = None;
            inner.navigate(View::FormatDetail);
            latest
        };

        if let Some(payload) = story.format(format_type).cloned() {
            let mut inner = self.inner.write().await;
            let base = inner
                .state
                .find_story(&story.id)
                .cloned()
                .unwrap_or_else(|| story.clone());
            inner
                .state
                .replace_story(&base.with_created_format(format_type));
            inner.display_format(&story.id, format_type, &payload);
            return Ok(payload);
        }

        match self
            .bounded("get format", self.store.get_format(&story.id, format_type))
            .await
        {
            Ok(payload) => {
                self.merge_format(&story, format_type, &payload).await;
                return Ok(payload);
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!("Format {} of {} not stored yet", format_type, story.id);
            }
            Err(e) => {
                self.inner.write().await.show_format_message(
                    &story.id,
                    format_type,
                    &format!("Error loading format: {}", e.message()),
                );
                return self.fail(e).await;
            }
        }

        let session = self.inner.read().await.state.valid_session().cloned();
        let Some(session) = session else {
            self.inner.write().await.show_format_message(
                &story.id,
                format_type,
                SIGN_IN_TO_CREATE_FORMAT,
            );
            return self
                .fail(SentimentalError::auth_required(SIGN_IN_TO_CREATE_FORMAT))
                .await;
        };
        if !session.owns(&story.owner_user_id) {
            self.inner.write().await.show_format_message(
                &story.id,
                format_type,
                OWNER_ONLY_FORMAT,
            );
            return self
                .fail(SentimentalError::access_denied(OWNER_ONLY_FORMAT))
                .await;
        }

        let key = (story.id.clone(), format_type.to_string());
        let generated = self
            .format_flights
            .run(key, || self.generate_format(&story, format_type, &session))
            .await;

        match generated {
            Ok(payload) => {
                self.merge_format(&story, format_type, &payload).await;
                Ok(payload)
            }
            Err(e) => {
                self.inner.write().await.show_format_message(
                    &story.id,
                    format_type,
                    FORMAT_GENERATION_FAILED,
                );
                self.fail(e).await
            }
        }
    }

    async fn generate_format(
        &self,
        story: &Story,
        format_type: &str,
        session: &Session,
    ) -> Result<FormatPayload> {
        tracing::info!("Generating {} for story {}", format_type, story.id);
        let derived = self
            .bounded(
                "derive format",
                self.generation
                    .derive_format(story, format_type, Requester::from(session)),
            )
            .await?;
        if !derived.stored {
            self.bounded(
                "store format",
                self.store.put_format(
                    &story.id,
                    format_type,
                    derived.payload.clone(),
                    &session.id,
                ),
            )
            .await?;
        }
        Ok(derived.payload)
    }

    /// Stores `payload` on every cached copy of the story and displays it.
    async fn merge_format(&self, story: &Story, format_type: &str, payload: &FormatPayload) {
        let mut inner = self.inner.write().await;
        let base = inner
            .state
            .find_story(&story.id)
            .cloned()
            .unwrap_or_else(|| story.clone());
        inner
            .state
            .replace_story(&base.with_format(format_type, payload.clone()));
        inner.display_format(&story.id, format_type, payload);
    }

    /// Owner edit of a format's text; title and audio are kept.
    pub async fn update_format(
        &self,
        story_id: &str,
        format_type: &str,
        content: &str,
    ) -> Result<FormatPayload> {
        if content.trim().is_empty() {
            return self
                .fail(SentimentalError::validation("Content cannot be empty"))
                .await;
        }
        let session = self.require_session().await?;
        self.check_owner(&session, story_id, OWNER_ONLY_FORMAT)
            .await?;

        let (story, payload) = self.edited_format(story_id, format_type, |existing| {
            existing
                .map(|p| p.with_content(content))
                .unwrap_or_else(|| FormatPayload::text(content))
        })
        .await;

        if let Err(e) = self
            .bounded(
                "store format",
                self.store
                    .put_format(story_id, format_type, payload.clone(), &session.id),
            )
            .await
        {
            return self.fail(e).await;
        }

        if let Some(story) = story {
            self.merge_format(&story, format_type, &payload).await;
        }
        self.info("Format updated.").await;
        Ok(payload)
    }

    /// Attaches an audio file to a format and returns its url.
    pub async fn upload_audio(
        &self,
        story_id: &str,
        format_type: &str,
        upload: AudioUpload,
    ) -> Result<String> {
        let session = self.require_session().await?;
        if !upload.content_type.starts_with("audio/") {
            return self
                .fail(SentimentalError::validation(
                    "Please select an audio file (MP3, WAV, etc.)",
                ))
                .await;
        }
        self.check_owner(&session, story_id, OWNER_ONLY_UPLOAD)
            .await?;

        let audio_url = match self
            .bounded(
                "upload audio",
                self.store
                    .upload_audio(upload, story_id, format_type, &session.id),
            )
            .await
        {
            Ok(url) => url,
            Err(e) => return self.fail(e).await,
        };

        let (story, payload) = self
            .edited_format(story_id, format_type, |existing| {
                existing
                    .cloned()
                    .unwrap_or_else(|| FormatPayload::text(String::new()))
                    .with_audio_url(audio_url.clone())
            })
            .await;
        if let Some(story) = story {
            self.merge_format(&story, format_type, &payload).await;
        }
        self.info("Audio uploaded successfully!").await;
        Ok(audio_url)
    }

    /// The cached story and `edit` applied to its current format payload.
    async fn edited_format<F>(
        &self,
        story_id: &str,
        format_type: &str,
        edit: F,
    ) -> (Option<Story>, FormatPayload)
    where
        F: FnOnce(Option<&FormatPayload>) -> FormatPayload,
    {
        let inner = self.inner.read().await;
        let story = inner.state.find_story(story_id).cloned();
        let payload = edit(story.as_ref().and_then(|s| s.format(format_type)));
        (story, payload)
    }
}

fn fallback_formats() -> Vec<String> {
    FALLBACK_SUPPORTED_FORMATS
        .iter()
        .map(|f| f.to_string())
        .collect()
}

fn local_story(id: String, new_story: NewStory) -> Story {
    Story {
        id,
        title: new_story.title,
        content: new_story.content,
        author_name: new_story.author,
        owner_user_id: new_story.user_id,
        is_public: new_story.is_public,
        created_formats: Default::default(),
        formats: Default::default(),
        created_at: Some(chrono::Utc::now().to_rfc3339()),
    }
}

#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;
