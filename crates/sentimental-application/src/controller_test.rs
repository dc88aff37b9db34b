use super::*;
use async_trait::async_trait;
use sentimental_core::session::EMPTY_SESSION_IDS;
use sentimental_core::generation::DerivedFormat;
use sentimental_core::story::{CreatedStory, StoryDraft};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex as StdMutex;

use crate::view_state::NoticeKind;

// ============================================================================
// Mock collaborators
// ============================================================================

#[derive(Default)]
struct MockAuth {
    users: StdMutex<HashMap<String, AuthUser>>,
    /// Overrides the id handed out by register/login.
    issued_id: Option<String>,
    fail_sync: bool,
    sign_outs: StdMutex<Vec<String>>,
}

#[async_trait]
impl AuthGateway for MockAuth {
    async fn register(&self, registration: Registration) -> Result<AuthUser> {
        let mut users = self.users.lock().unwrap();
        if users.contains_key(&registration.email) {
            return Err(SentimentalError::Conflict(
                "An account with this email already exists".into(),
            ));
        }
        let user = AuthUser {
            user_id: self
                .issued_id
                .clone()
                .unwrap_or_else(|| format!("demo_{}", users.len() + 1)),
            email: registration.email.clone(),
            name: registration.name,
        };
        users.insert(registration.email, user.clone());
        Ok(user)
    }

    async fn login(&self, credentials: Credentials) -> Result<AuthUser> {
        self.users
            .lock()
            .unwrap()
            .get(&credentials.email)
            .cloned()
            .ok_or_else(|| SentimentalError::Unauthorized("Invalid email or password".into()))
    }

    async fn sync_identity(&self, identity: ProviderIdentity) -> Result<AuthUser> {
        if self.fail_sync {
            return Err(SentimentalError::network("backend unreachable"));
        }
        Ok(AuthUser {
            user_id: identity.uid.clone(),
            email: identity.email.clone(),
            name: "Synced Name".into(),
        })
    }

    async fn sign_out(&self, session: &Session) -> Result<()> {
        self.sign_outs.lock().unwrap().push(session.id.clone());
        Ok(())
    }
}

#[derive(Default)]
struct MockStore {
    stories: StdMutex<Vec<Story>>,
    formats: StdMutex<HashMap<(String, String), FormatPayload>>,
    calls: StdMutex<Vec<&'static str>>,
    fail_create: bool,
    /// Simulates an eventually consistent listing.
    hide_created: bool,
    fail_visibility: Option<SentimentalError>,
    supported: Option<Vec<String>>,
}

impl MockStore {
    fn with_stories(stories: Vec<Story>) -> Self {
        Self {
            stories: StdMutex::new(stories),
            ..Default::default()
        }
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    fn count(&self, call: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == call)
            .count()
    }
}

#[async_trait]
impl ContentStore for MockStore {
    async fn list_public_stories(&self) -> Result<Vec<Story>> {
        self.record("list_public");
        Ok(self
            .stories
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.is_public)
            .cloned()
            .collect())
    }

    async fn list_user_stories(&self, user_id: &str) -> Result<Vec<Story>> {
        self.record("list_user");
        Ok(self
            .stories
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.owner_user_id == user_id)
            .cloned()
            .collect())
    }

    async fn create_story(&self, new_story: NewStory) -> Result<CreatedStory> {
        self.record("create");
        if self.fail_create {
            return Err(SentimentalError::network("store unavailable"));
        }
        let mut stories = self.stories.lock().unwrap();
        let id = format!("story-{}", stories.len() + 1);
        if !self.hide_created {
            stories.insert(0, local_story(id.clone(), new_story));
        }
        Ok(CreatedStory { id })
    }

    async fn update_story(&self, story_id: &str, update: StoryUpdate, _actor: &str) -> Result<Story> {
        self.record("update");
        let mut stories = self.stories.lock().unwrap();
        let story = stories
            .iter_mut()
            .find(|s| s.id == story_id)
            .ok_or_else(|| SentimentalError::not_found("story", story_id))?;
        if let Some(title) = update.title {
            story.title = title;
        }
        if let Some(content) = update.content {
            story.content = content;
        }
        Ok(story.clone())
    }

    async fn set_story_visibility(
        &self,
        story_id: &str,
        is_public: bool,
        _actor: &str,
    ) -> Result<VisibilityChange> {
        self.record("visibility");
        if let Some(err) = &self.fail_visibility {
            return Err(err.clone());
        }
        let mut stories = self.stories.lock().unwrap();
        if let Some(story) = stories.iter_mut().find(|s| s.id == story_id) {
            story.is_public = is_public;
        }
        Ok(VisibilityChange {
            is_public,
            message: format!(
                "Story is now {}",
                if is_public { "public" } else { "private" }
            ),
        })
    }

    async fn get_format(&self, story_id: &str, format_type: &str) -> Result<FormatPayload> {
        self.record("get_format");
        self.formats
            .lock()
            .unwrap()
            .get(&(story_id.to_string(), format_type.to_string()))
            .cloned()
            .ok_or_else(|| SentimentalError::not_found("format", format_type))
    }

    async fn put_format(
        &self,
        story_id: &str,
        format_type: &str,
        payload: FormatPayload,
        _actor: &str,
    ) -> Result<()> {
        self.record("put_format");
        self.formats
            .lock()
            .unwrap()
            .insert((story_id.to_string(), format_type.to_string()), payload);
        Ok(())
    }

    async fn upload_audio(
        &self,
        upload: AudioUpload,
        story_id: &str,
        format_type: &str,
        _actor: &str,
    ) -> Result<String> {
        self.record("upload");
        Ok(format!(
            "memory://audio/{}/{}/{}",
            story_id, format_type, upload.file_name
        ))
    }

    async fn supported_formats(&self) -> Result<Vec<String>> {
        self.supported
            .clone()
            .ok_or_else(|| SentimentalError::network("formats endpoint down"))
    }
}

#[derive(Default)]
struct MockGeneration {
    chat_delay: Duration,
    format_delay: Duration,
    fail_chat: bool,
    fail_story: bool,
    fail_format: bool,
    /// Stores derived stories and formats here itself, like a hosted backend.
    server: Option<Arc<MockStore>>,
    /// Whether server-stored stories come back with their id.
    report_stored_id: bool,
    requesters: StdMutex<Vec<String>>,
    calls: StdMutex<Vec<&'static str>>,
}

impl MockGeneration {
    fn count(&self, call: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == call)
            .count()
    }
}

#[async_trait]
impl GenerationService for MockGeneration {
    async fn chat(
        &self,
        messages: &[ConversationMessage],
        requester: Requester<'_>,
    ) -> Result<String> {
        self.calls.lock().unwrap().push("chat");
        self.requesters
            .lock()
            .unwrap()
            .push(requester.user_id.to_string());
        tokio::time::sleep(self.chat_delay).await;
        if self.fail_chat {
            return Err(SentimentalError::generation("model overloaded"));
        }
        let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        Ok(format!("reply to {last}"))
    }

    async fn derive_story(
        &self,
        conversation: &[ConversationMessage],
        requester: Requester<'_>,
    ) -> Result<DerivedStory> {
        self.calls.lock().unwrap().push("derive_story");
        if self.fail_story {
            return Err(SentimentalError::generation("could not derive story"));
        }
        let draft = StoryDraft {
            title: "A Quiet Morning".into(),
            text: "I woke up early and listened.".into(),
        };
        let Some(server) = &self.server else {
            return Ok(DerivedStory::Draft(draft));
        };

        let id = "srv-1".to_string();
        let stored = local_story(
            id.clone(),
            NewStory {
                title: draft.title,
                content: draft.text,
                conversation: conversation.to_vec(),
                user_id: requester.user_id.to_string(),
                author: requester.author.to_string(),
                is_public: false,
            },
        );
        server.stories.lock().unwrap().insert(0, stored);
        Ok(DerivedStory::Stored {
            id: self.report_stored_id.then_some(id),
        })
    }

    async fn derive_format(
        &self,
        story: &Story,
        format_type: &str,
        _requester: Requester<'_>,
    ) -> Result<DerivedFormat> {
        self.calls.lock().unwrap().push("derive_format");
        tokio::time::sleep(self.format_delay).await;
        if self.fail_format {
            return Err(SentimentalError::generation("format failed"));
        }
        let payload = FormatPayload::text(format!("{format_type}: {}", story.content));
        match &self.server {
            Some(server) => {
                server
                    .formats
                    .lock()
                    .unwrap()
                    .insert((story.id.clone(), format_type.to_string()), payload.clone());
                Ok(DerivedFormat::stored(payload))
            }
            None => Ok(DerivedFormat::unsaved(payload)),
        }
    }
}

#[derive(Default)]
struct MockSessions {
    cached: StdMutex<Option<Session>>,
    clears: StdMutex<usize>,
}

#[async_trait]
impl SessionStore for MockSessions {
    async fn load(&self) -> Result<Option<Session>> {
        Ok(self.cached.lock().unwrap().clone())
    }

    async fn save(&self, session: &Session) -> Result<()> {
        *self.cached.lock().unwrap() = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.cached.lock().unwrap() = None;
        *self.clears.lock().unwrap() += 1;
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    auth: Arc<MockAuth>,
    store: Arc<MockStore>,
    generation: Arc<MockGeneration>,
    sessions: Arc<MockSessions>,
    controller: ViewStateController,
}

impl Harness {
    fn build(
        auth: MockAuth,
        store: MockStore,
        generation: MockGeneration,
        settings: ControllerSettings,
    ) -> Self {
        Self::with_shared_store(auth, Arc::new(store), generation, settings)
    }

    fn with_shared_store(
        auth: MockAuth,
        store: Arc<MockStore>,
        generation: MockGeneration,
        settings: ControllerSettings,
    ) -> Self {
        let auth = Arc::new(auth);
        let generation = Arc::new(generation);
        let sessions = Arc::new(MockSessions::default());
        let controller = ViewStateController::new(
            auth.clone(),
            store.clone(),
            generation.clone(),
            sessions.clone(),
            settings,
        );
        Self {
            auth,
            store,
            generation,
            sessions,
            controller,
        }
    }

    fn new(store: MockStore, generation: MockGeneration) -> Self {
        Self::build(
            MockAuth::default(),
            store,
            generation,
            ControllerSettings::default(),
        )
    }

    /// Caches `user_id` as the session and runs startup.
    async fn signed_in_as(self, user_id: &str) -> Self {
        *self.sessions.cached.lock().unwrap() =
            Some(Session::new(user_id, "Tester", "tester@example.com"));
        self.controller.initialize().await;
        self
    }
}

fn story(id: &str, owner: &str, is_public: bool) -> Story {
    Story {
        id: id.into(),
        title: format!("Story {id}"),
        content: "The river was loud that night.".into(),
        author_name: "Author".into(),
        owner_user_id: owner.into(),
        is_public,
        created_formats: BTreeSet::new(),
        formats: BTreeMap::new(),
        created_at: None,
    }
}

fn with_song(mut story: Story) -> Story {
    story.formats.insert(
        "song".into(),
        FormatPayload::text("TITLE: \"River Song\"\nverse one"),
    );
    story
}

// ============================================================================
// Session gating
// ============================================================================

#[tokio::test]
async fn test_placeholder_session_ids_require_login() {
    for id in EMPTY_SESSION_IDS {
        let h = Harness::new(MockStore::default(), MockGeneration::default())
            .signed_in_as(id)
            .await;

        let err = h.controller.require_session().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthRequired, "id {id:?}");
        assert!(h.controller.snapshot().await.login_prompt);
        assert_eq!(*h.sessions.clears.lock().unwrap(), 1, "id {id:?}");
    }

    let h = Harness::new(MockStore::default(), MockGeneration::default());
    h.controller.initialize().await;
    let err = h.controller.require_session().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthRequired);
}

#[tokio::test]
async fn test_real_session_id_passes() {
    let h = Harness::new(MockStore::default(), MockGeneration::default())
        .signed_in_as("demo_42")
        .await;

    let session = h.controller.require_session().await.unwrap();
    assert_eq!(session.id, "demo_42");
    assert!(!h.controller.snapshot().await.login_prompt);
}

#[tokio::test]
async fn test_send_without_session_is_rejected_before_generation() {
    let h = Harness::new(MockStore::default(), MockGeneration::default());
    h.controller.navigate(View::Share).await;

    let err = h.controller.send_message("hello").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AuthRequired);
    assert!(h.controller.conversation().await.is_empty());
    assert_eq!(h.generation.count("chat"), 0);
}

#[tokio::test]
async fn test_register_rejects_invalid_user_id() {
    let h = Harness::build(
        MockAuth {
            issued_id: Some("undefined".into()),
            ..Default::default()
        },
        MockStore::default(),
        MockGeneration::default(),
        ControllerSettings::default(),
    );

    let err = h
        .controller
        .register("a@x.com", "A", None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AuthRequired);
    assert!(h.controller.session().await.is_none());
    assert!(h.sessions.cached.lock().unwrap().is_none());
}

#[tokio::test]
async fn test_register_validates_fields() {
    let h = Harness::new(MockStore::default(), MockGeneration::default());

    let err = h.controller.register("  ", "A", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);
    assert!(h.auth.users.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_login_with_unknown_email_surfaces_auth_error() {
    let h = Harness::new(MockStore::default(), MockGeneration::default());

    let err = h.controller.login("ghost@x.com", None).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AuthRequired);
    let notice = h.controller.snapshot().await.notice.unwrap();
    assert_eq!(notice.message, "Invalid email or password");
}

#[tokio::test]
async fn test_identity_sync_falls_back_to_provider_data() {
    let h = Harness::build(
        MockAuth {
            fail_sync: true,
            ..Default::default()
        },
        MockStore::default(),
        MockGeneration::default(),
        ControllerSettings::default(),
    );
    let identity = ProviderIdentity {
        uid: "g-123".into(),
        email: "kai@example.com".into(),
        display_name: None,
        email_verified: true,
        photo_url: Some("https://img/kai.png".into()),
        provider: "google".into(),
    };

    let session = h.controller.sync_identity(identity).await.unwrap();

    assert_eq!(session.id, "g-123");
    assert_eq!(session.display_name, "kai");
    assert_eq!(session.avatar_url.as_deref(), Some("https://img/kai.png"));
    assert_eq!(
        h.sessions.cached.lock().unwrap().as_ref().map(|s| s.id.clone()),
        Some("g-123".to_string())
    );
}

#[tokio::test]
async fn test_logout_signs_out_provider_sessions_only() {
    let h = Harness::new(MockStore::default(), MockGeneration::default())
        .signed_in_as("demo_1")
        .await;
    h.controller.logout().await;
    assert!(h.auth.sign_outs.lock().unwrap().is_empty());
    assert!(h.controller.session().await.is_none());

    let h = Harness::new(MockStore::default(), MockGeneration::default())
        .signed_in_as("g-777")
        .await;
    h.controller.navigate(View::Share).await;
    h.controller.send_message("hi").await.unwrap();

    h.controller.logout().await;

    assert_eq!(*h.auth.sign_outs.lock().unwrap(), vec!["g-777".to_string()]);
    let state = h.controller.snapshot().await;
    assert!(state.session.is_none());
    assert!(state.conversation.is_empty());
    assert!(state.user_stories.is_empty());
    assert_eq!(state.view.current_view, View::Discover);
    assert!(h.sessions.cached.lock().unwrap().is_none());
}

// ============================================================================
// Conversation
// ============================================================================

#[tokio::test]
async fn test_register_then_hello_appends_one_turn_each() {
    let h = Harness::new(MockStore::default(), MockGeneration::default());
    h.controller.initialize().await;

    h.controller.register("a@x.com", "A", None).await.unwrap();
    h.controller.navigate(View::Share).await;
    let reply = h.controller.send_message("hello").await.unwrap();

    let conversation = h.controller.conversation().await;
    assert_eq!(
        conversation,
        vec![
            ConversationMessage::user("hello"),
            ConversationMessage::assistant("reply to hello"),
        ]
    );
    assert_eq!(reply, "reply to hello");
    assert_eq!(*h.generation.requesters.lock().unwrap(), vec!["demo_1".to_string()]);
}

#[tokio::test]
async fn test_blank_message_is_rejected() {
    let h = Harness::new(MockStore::default(), MockGeneration::default())
        .signed_in_as("demo_1")
        .await;

    let err = h.controller.send_message("   ").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ValidationError);
    assert!(h.controller.conversation().await.is_empty());
}

#[tokio::test]
async fn test_concurrent_sends_keep_submission_order() {
    let h = Harness::new(
        MockStore::default(),
        MockGeneration {
            chat_delay: Duration::from_millis(30),
            ..Default::default()
        },
    )
    .signed_in_as("demo_1")
    .await;
    h.controller.navigate(View::Share).await;

    let (first, second) = tokio::join!(
        h.controller.send_message("one"),
        h.controller.send_message("two")
    );
    first.unwrap();
    second.unwrap();

    let contents: Vec<String> = h
        .controller
        .conversation()
        .await
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(contents, vec!["one", "reply to one", "two", "reply to two"]);
}

#[tokio::test]
async fn test_chat_failure_appends_placeholder() {
    let h = Harness::new(
        MockStore::default(),
        MockGeneration {
            fail_chat: true,
            ..Default::default()
        },
    )
    .signed_in_as("demo_1")
    .await;
    h.controller.navigate(View::Share).await;

    let err = h.controller.send_message("hello").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::GenerationFailure);
    let conversation = h.controller.conversation().await;
    assert_eq!(conversation.len(), 2);
    assert_eq!(conversation[1].content, CHAT_ERROR_PLACEHOLDER);
    assert!(h.controller.snapshot().await.notice.unwrap().is_error());
}

#[tokio::test(start_paused = true)]
async fn test_hung_chat_times_out_as_transient() {
    let h = Harness::build(
        MockAuth::default(),
        MockStore::default(),
        MockGeneration {
            chat_delay: Duration::from_secs(600),
            ..Default::default()
        },
        ControllerSettings {
            request_timeout: Duration::from_secs(5),
        },
    )
    .signed_in_as("demo_1")
    .await;
    h.controller.navigate(View::Share).await;

    let err = h.controller.send_message("hello").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TransientNetwork);
    let conversation = h.controller.conversation().await;
    assert_eq!(conversation[1].content, CHAT_ERROR_PLACEHOLDER);
}

#[tokio::test]
async fn test_reply_after_leaving_share_is_dropped() {
    let h = Harness::new(
        MockStore::default(),
        MockGeneration {
            chat_delay: Duration::from_millis(80),
            ..Default::default()
        },
    )
    .signed_in_as("demo_1")
    .await;
    h.controller.navigate(View::Share).await;

    let (sent, _) = tokio::join!(h.controller.send_message("hello"), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        h.controller.navigate(View::Discover).await
    });

    assert!(sent.is_ok());
    assert!(h.controller.conversation().await.is_empty());
}

// ============================================================================
// Story derivation
// ============================================================================

#[tokio::test]
async fn test_derive_with_empty_buffer_is_noop() {
    let h = Harness::new(MockStore::default(), MockGeneration::default())
        .signed_in_as("demo_1")
        .await;

    let derived = h.controller.derive_story_from_conversation().await.unwrap();

    assert!(derived.is_none());
    assert_eq!(h.store.count("create"), 0);
    assert_eq!(h.generation.count("derive_story"), 0);
}

#[tokio::test]
async fn test_derive_generation_failure_keeps_buffer() {
    let h = Harness::new(
        MockStore::default(),
        MockGeneration {
            fail_story: true,
            ..Default::default()
        },
    )
    .signed_in_as("demo_1")
    .await;
    h.controller.navigate(View::Share).await;
    h.controller.send_message("hello").await.unwrap();

    let err = h
        .controller
        .derive_story_from_conversation()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::GenerationFailure);
    assert_eq!(h.controller.conversation().await.len(), 2);
    assert_eq!(h.store.count("create"), 0);
    assert_eq!(h.controller.current_view().await, View::Share);
}

#[tokio::test]
async fn test_derive_store_failure_keeps_buffer() {
    let h = Harness::new(
        MockStore {
            fail_create: true,
            ..Default::default()
        },
        MockGeneration::default(),
    )
    .signed_in_as("demo_1")
    .await;
    h.controller.navigate(View::Share).await;
    h.controller.send_message("hello").await.unwrap();

    let err = h
        .controller
        .derive_story_from_conversation()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TransientNetwork);
    assert_eq!(h.controller.conversation().await.len(), 2);
    assert_eq!(h.generation.count("derive_story"), 1);
}

#[tokio::test]
async fn test_derive_success_lands_on_stories() {
    let h = Harness::new(MockStore::default(), MockGeneration::default())
        .signed_in_as("demo_1")
        .await;
    h.controller.navigate(View::Share).await;
    h.controller.send_message("hello").await.unwrap();

    let created = h
        .controller
        .derive_story_from_conversation()
        .await
        .unwrap()
        .unwrap();

    let state = h.controller.snapshot().await;
    assert!(state.conversation.is_empty());
    assert_eq!(state.view.current_view, View::Stories);
    assert_eq!(state.view.previous_view, Some(View::Share));
    assert!(state.user_stories.iter().any(|s| s.id == created.id));
    assert!(!created.is_public);
    assert_eq!(created.owner_user_id, "demo_1");
    assert_eq!(state.notice.unwrap().kind, NoticeKind::Info);
}

#[tokio::test]
async fn test_derive_tolerates_eventually_consistent_listing() {
    let h = Harness::new(
        MockStore {
            hide_created: true,
            ..Default::default()
        },
        MockGeneration::default(),
    )
    .signed_in_as("demo_1")
    .await;
    h.controller.navigate(View::Share).await;
    h.controller.send_message("hello").await.unwrap();

    let created = h
        .controller
        .derive_story_from_conversation()
        .await
        .unwrap()
        .unwrap();

    assert_eq!(created.title, "A Quiet Morning");
    let state = h.controller.snapshot().await;
    assert_eq!(state.user_stories[0].id, created.id);
    assert!(state.conversation.is_empty());
}

/// A hosted backend that stores derived stories itself.
fn server_harness(report_stored_id: bool) -> Harness {
    let store = Arc::new(MockStore::default());
    Harness::with_shared_store(
        MockAuth::default(),
        store.clone(),
        MockGeneration {
            server: Some(store),
            report_stored_id,
            ..Default::default()
        },
        ControllerSettings::default(),
    )
}

#[tokio::test]
async fn test_derive_stored_by_service_skips_create() {
    for report_stored_id in [true, false] {
        let h = server_harness(report_stored_id).signed_in_as("demo_1").await;
        h.controller.navigate(View::Share).await;
        h.controller.send_message("hello").await.unwrap();

        let created = h
            .controller
            .derive_story_from_conversation()
            .await
            .unwrap()
            .unwrap();

        assert_eq!(created.id, "srv-1", "report id {report_stored_id}");
        assert_eq!(created.owner_user_id, "demo_1");
        assert_eq!(created.author_name, "Tester");
        assert_eq!(h.store.count("create"), 0);
        let state = h.controller.snapshot().await;
        assert_eq!(state.user_stories.len(), 1);
        assert!(state.conversation.is_empty());
        assert_eq!(state.view.current_view, View::Stories);
    }
}

// ============================================================================
// Navigation
// ============================================================================

#[tokio::test]
async fn test_detail_views_without_selection_fall_back_to_discover() {
    let h = Harness::new(MockStore::default(), MockGeneration::default());

    assert_eq!(h.controller.navigate(View::StoryDetail).await, View::Discover);
    assert_eq!(h.controller.navigate(View::FormatDetail).await, View::Discover);
    assert_eq!(h.controller.navigate_to("settings").await, View::Discover);
    assert_eq!(h.controller.navigate_to("inner-space").await, View::InnerSpace);
}

#[tokio::test]
async fn test_tab_switch_records_previous_and_clears_selection() {
    let s = story("s1", "demo_a", true);
    let h = Harness::new(MockStore::with_stories(vec![s.clone()]), MockGeneration::default());
    h.controller.initialize().await;

    h.controller.open_story(&s).await;
    h.controller.navigate(View::Stories).await;

    let view = h.controller.snapshot().await.view;
    assert_eq!(view.current_view, View::Stories);
    assert!(view.selected_story.is_none());
    assert!(view.selected_format.is_none());
    assert!(view.format_content.is_none());

    h.controller.navigate(View::Share).await;
    assert_eq!(
        h.controller.snapshot().await.view.previous_view,
        Some(View::Stories)
    );
}

#[tokio::test]
async fn test_back_to_story_restores_selection() {
    let s = with_song(story("s1", "demo_a", true));
    let h = Harness::new(MockStore::with_stories(vec![s.clone()]), MockGeneration::default());
    h.controller.initialize().await;
    h.controller.navigate(View::Stories).await;

    h.controller.open_story(&s).await;
    let opened = h.controller.snapshot().await.view.selected_story.unwrap();
    h.controller.view_format(&s, "song").await.unwrap();

    assert_eq!(h.controller.back().await, View::StoryDetail);
    let view = h.controller.snapshot().await.view;
    assert_eq!(view.selected_story.unwrap().id, opened.id);
    assert!(view.selected_format.is_none());
    assert!(view.format_content.is_none());

    assert_eq!(h.controller.back().await, View::Stories);
}

#[tokio::test]
async fn test_story_opened_outside_lists_goes_back_to_discover() {
    let s = story("s1", "demo_a", true);
    let h = Harness::new(MockStore::with_stories(vec![s.clone()]), MockGeneration::default());
    h.controller.initialize().await;

    for tab in [View::Share, View::InnerSpace] {
        h.controller.navigate(tab).await;
        h.controller.open_story(&s).await;

        let view = h.controller.snapshot().await.view;
        assert_eq!(view.previous_view, Some(View::Discover), "from {tab}");
        assert_eq!(h.controller.back().await, View::Discover, "from {tab}");
    }
}

// ============================================================================
// Formats
// ============================================================================

#[tokio::test]
async fn test_cached_format_is_shown_without_any_call() {
    let s = with_song(story("s1", "demo_a", true));
    let h = Harness::new(MockStore::with_stories(vec![s.clone()]), MockGeneration::default());
    h.controller.initialize().await;

    h.controller.view_format(&s, "song").await.unwrap();
    h.controller.view_format(&s, "song").await.unwrap();

    assert_eq!(h.generation.count("derive_format"), 0);
    assert_eq!(h.store.count("get_format"), 0);

    let state = h.controller.snapshot().await;
    let selected = state.view.selected_format.unwrap();
    assert_eq!(selected.title.as_deref(), Some("River Song"));
    assert!(state.public_stories[0].created_formats.contains("song"));
    assert_eq!(state.public_stories[0].created_formats.len(), 1);
}

#[tokio::test]
async fn test_stored_format_is_fetched_before_generating() {
    let s = story("s1", "demo_a", true);
    let store = MockStore::with_stories(vec![s.clone()]);
    store.formats.lock().unwrap().insert(
        ("s1".into(), "poem".into()),
        FormatPayload::text("roses"),
    );
    let h = Harness::new(store, MockGeneration::default());
    h.controller.initialize().await;

    let payload = h.controller.view_format(&s, "poem").await.unwrap();

    assert_eq!(payload.content(), "roses");
    assert_eq!(h.generation.count("derive_format"), 0);
    let state = h.controller.snapshot().await;
    assert_eq!(state.view.format_content.as_deref(), Some("roses"));
    assert!(state.public_stories[0].formats.contains_key("poem"));
}

#[tokio::test]
async fn test_owner_generates_once_then_reads_cache() {
    let s = story("s1", "demo_a", false);
    let h = Harness::new(MockStore::with_stories(vec![s.clone()]), MockGeneration::default())
        .signed_in_as("demo_a")
        .await;

    h.controller.view_format(&s, "song").await.unwrap();
    h.controller.view_format(&s, "song").await.unwrap();

    assert_eq!(h.generation.count("derive_format"), 1);
    assert_eq!(h.store.count("put_format"), 1);
    let state = h.controller.snapshot().await;
    assert!(state.user_stories[0].created_formats.contains("song"));
}

#[tokio::test]
async fn test_cached_format_keeps_concurrent_privacy_change() {
    let s = with_song(story("s1", "demo_a", true));
    let h = Harness::new(MockStore::with_stories(vec![s.clone()]), MockGeneration::default());
    h.controller.initialize().await;

    // Queue the view, then an edit behind it, so the edit lands between
    // the view's two state updates.
    let held = h.controller.inner.write().await;
    let edit = async {
        let mut inner = h.controller.inner.write().await;
        let private = inner.state.find_story("s1").unwrap().with_visibility(false);
        inner.state.replace_story(&private);
    };
    let release = async move {
        tokio::task::yield_now().await;
        drop(held);
    };
    let (viewed, _, _) = tokio::join!(h.controller.view_format(&s, "song"), edit, release);
    viewed.unwrap();

    let cached = h.controller.snapshot().await.public_stories[0].clone();
    assert!(!cached.is_public);
    assert!(cached.created_formats.contains("song"));
}

#[tokio::test]
async fn test_format_stored_by_service_is_not_put_again() {
    let s = story("s1", "demo_1", false);
    let store = Arc::new(MockStore::with_stories(vec![s.clone()]));
    let h = Harness::with_shared_store(
        MockAuth::default(),
        store.clone(),
        MockGeneration {
            server: Some(store),
            ..Default::default()
        },
        ControllerSettings::default(),
    )
    .signed_in_as("demo_1")
    .await;

    let payload = h.controller.view_format(&s, "poem").await.unwrap();

    assert_eq!(h.generation.count("derive_format"), 1);
    assert_eq!(h.store.count("put_format"), 0);
    assert_eq!(
        h.store
            .formats
            .lock()
            .unwrap()
            .get(&("s1".to_string(), "poem".to_string())),
        Some(&payload)
    );
    let state = h.controller.snapshot().await;
    assert!(state.user_stories[0].created_formats.contains("poem"));
}

#[tokio::test]
async fn test_concurrent_views_share_one_generation() {
    let s = story("s1", "demo_a", false);
    let h = Harness::new(
        MockStore::with_stories(vec![s.clone()]),
        MockGeneration {
            format_delay: Duration::from_millis(50),
            ..Default::default()
        },
    )
    .signed_in_as("demo_a")
    .await;

    let (a, b) = tokio::join!(
        h.controller.view_format(&s, "song"),
        h.controller.view_format(&s, "song")
    );

    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(h.generation.count("derive_format"), 1);
    assert_eq!(h.store.count("put_format"), 1);
}

#[tokio::test]
async fn test_missing_format_without_session_asks_to_sign_in() {
    let s = story("s1", "demo_a", true);
    let h = Harness::new(MockStore::with_stories(vec![s.clone()]), MockGeneration::default());
    h.controller.initialize().await;

    let err = h.controller.view_format(&s, "song").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AuthRequired);
    let state = h.controller.snapshot().await;
    assert!(state.login_prompt);
    assert_eq!(
        state.view.format_content.as_deref(),
        Some(SIGN_IN_TO_CREATE_FORMAT)
    );
    assert_eq!(h.generation.count("derive_format"), 0);
}

#[tokio::test]
async fn test_missing_format_for_non_owner_is_access_denied() {
    let s = story("s1", "demo_a", true);
    let h = Harness::new(MockStore::with_stories(vec![s.clone()]), MockGeneration::default())
        .signed_in_as("demo_b")
        .await;

    let err = h.controller.view_format(&s, "song").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AccessDenied);
    let state = h.controller.snapshot().await;
    assert!(!state.login_prompt);
    assert_eq!(state.view.format_content.as_deref(), Some(OWNER_ONLY_FORMAT));
    assert_eq!(h.generation.count("derive_format"), 0);
}

#[tokio::test]
async fn test_format_generation_failure_shows_placeholder() {
    let s = story("s1", "demo_a", false);
    let h = Harness::new(
        MockStore::with_stories(vec![s.clone()]),
        MockGeneration {
            fail_format: true,
            ..Default::default()
        },
    )
    .signed_in_as("demo_a")
    .await;

    let err = h.controller.view_format(&s, "poem").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::GenerationFailure);
    let state = h.controller.snapshot().await;
    assert_eq!(
        state.view.format_content.as_deref(),
        Some(FORMAT_GENERATION_FAILED)
    );
    assert!(state.user_stories[0].formats.is_empty());
    assert_eq!(h.store.count("put_format"), 0);
}

#[tokio::test]
async fn test_upload_audio_attaches_url() {
    let s = with_song(story("s1", "demo_a", false));
    let h = Harness::new(MockStore::with_stories(vec![s.clone()]), MockGeneration::default())
        .signed_in_as("demo_a")
        .await;
    h.controller.view_format(&s, "song").await.unwrap();

    let url = h
        .controller
        .upload_audio(
            "s1",
            "song",
            AudioUpload {
                file_name: "take1.mp3".into(),
                content_type: "audio/mpeg".into(),
                bytes: vec![1, 2, 3],
            },
        )
        .await
        .unwrap();

    assert_eq!(url, "memory://audio/s1/song/take1.mp3");
    let state = h.controller.snapshot().await;
    assert_eq!(
        state.view.selected_format.unwrap().audio_url.as_deref(),
        Some(url.as_str())
    );
    let cached = state.user_stories[0].format("song").unwrap();
    assert_eq!(cached.audio_url(), Some(url.as_str()));
    assert!(cached.content().starts_with("TITLE:"));
}

#[tokio::test]
async fn test_upload_rejects_non_audio_files() {
    let h = Harness::new(
        MockStore::with_stories(vec![story("s1", "demo_a", false)]),
        MockGeneration::default(),
    )
    .signed_in_as("demo_a")
    .await;

    let err = h
        .controller
        .upload_audio(
            "s1",
            "song",
            AudioUpload {
                file_name: "notes.txt".into(),
                content_type: "text/plain".into(),
                bytes: vec![1],
            },
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ValidationError);
    assert_eq!(h.store.count("upload"), 0);
}

#[tokio::test]
async fn test_update_format_keeps_title() {
    let mut s = story("s1", "demo_a", false);
    s.formats.insert(
        "song".into(),
        FormatPayload::titled("old lyrics", "Old Title"),
    );
    let h = Harness::new(MockStore::with_stories(vec![s.clone()]), MockGeneration::default())
        .signed_in_as("demo_a")
        .await;

    let payload = h
        .controller
        .update_format("s1", "song", "new lyrics")
        .await
        .unwrap();

    assert_eq!(payload, FormatPayload::titled("new lyrics", "Old Title"));
    assert_eq!(h.store.count("put_format"), 1);
}

// ============================================================================
// Privacy and edits
// ============================================================================

#[tokio::test]
async fn test_privacy_toggle_by_non_owner_is_rejected_without_mutation() {
    let s = story("s1", "demo_a", true);
    let h = Harness::new(MockStore::with_stories(vec![s.clone()]), MockGeneration::default())
        .signed_in_as("demo_b")
        .await;
    let before = h.controller.snapshot().await.public_stories;

    let err = h
        .controller
        .toggle_story_privacy("s1", true)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AccessDenied);
    assert_eq!(h.store.count("visibility"), 0);
    let state = h.controller.snapshot().await;
    assert_eq!(state.public_stories, before);
    assert!(!state.login_prompt);
}

#[tokio::test]
async fn test_privacy_toggle_by_owner_updates_caches() {
    let s = story("s1", "demo_a", true);
    let h = Harness::new(MockStore::with_stories(vec![s.clone()]), MockGeneration::default())
        .signed_in_as("demo_a")
        .await;

    let change = h.controller.toggle_story_privacy("s1", true).await.unwrap();

    assert!(!change.is_public);
    let state = h.controller.snapshot().await;
    assert!(!state.user_stories[0].is_public);
    assert!(state.public_stories.is_empty());
    assert_eq!(state.notice.unwrap().message, "Story is now private");

    h.controller.toggle_story_privacy("s1", false).await.unwrap();
    assert_eq!(h.controller.snapshot().await.public_stories.len(), 1);
}

#[tokio::test]
async fn test_privacy_failure_surfaces_server_message() {
    let s = story("s1", "demo_a", false);
    let h = Harness::new(
        MockStore {
            stories: StdMutex::new(vec![s.clone()]),
            fail_visibility: Some(SentimentalError::network("Story service is in maintenance")),
            ..Default::default()
        },
        MockGeneration::default(),
    )
    .signed_in_as("demo_a")
    .await;

    let err = h
        .controller
        .toggle_story_privacy("s1", false)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TransientNetwork);
    let state = h.controller.snapshot().await;
    assert_eq!(state.notice.unwrap().message, "Story service is in maintenance");
    assert!(!state.user_stories[0].is_public);
}

#[tokio::test]
async fn test_update_story_requires_title_and_content() {
    let h = Harness::new(
        MockStore::with_stories(vec![story("s1", "demo_a", false)]),
        MockGeneration::default(),
    )
    .signed_in_as("demo_a")
    .await;

    let err = h
        .controller
        .update_story("s1", " ", "body")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);
    assert_eq!(h.store.count("update"), 0);

    let updated = h
        .controller
        .update_story("s1", "New Title", "New body")
        .await
        .unwrap();
    assert_eq!(updated.title, "New Title");
    assert_eq!(
        h.controller.snapshot().await.user_stories[0].title,
        "New Title"
    );
}

// ============================================================================
// Startup
// ============================================================================

#[tokio::test]
async fn test_initialize_falls_back_to_builtin_formats() {
    let h = Harness::new(MockStore::default(), MockGeneration::default());
    h.controller.initialize().await;
    assert_eq!(
        h.controller.snapshot().await.supported_formats,
        fallback_formats()
    );

    let h = Harness::new(
        MockStore {
            supported: Some(vec!["song".into(), "poem".into()]),
            ..Default::default()
        },
        MockGeneration::default(),
    );
    h.controller.initialize().await;
    assert_eq!(
        h.controller.snapshot().await.supported_formats,
        vec!["song", "poem"]
    );
}
