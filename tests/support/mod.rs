// Shared primitives for one-time server bootstrapping across integration tests.
use arena_server::Services;
use arena_server::domain::state::Identity;
use arena_server::interface_adapters::clients::identity::InMemoryIdentityProvider;
use arena_server::interface_adapters::clients::stats::InMemoryStatsRepository;
use arena_server::use_cases::lobby::RoomSettings;
use std::{
    // `Arc` shares data between threads; `OnceLock` writes a value only once.
    sync::{Arc, OnceLock},
    // Sleep durations are used in readiness polling loops.
    time::Duration,
};

/// Session token preset for an administrator account.
pub const ADMIN_TOKEN: &str = "admin-session";
/// Session token preset for a registered member account.
pub const MEMBER_TOKEN: &str = "member-session";
/// Session token preset for a member account the ban flow uses.
pub const OUTLAW_TOKEN: &str = "outlaw-session";

// Global base URL used by all tests after the server publishes its bound address.
static SERVER_URL: OnceLock<String> = OnceLock::new();
// One-time guard that ensures the server bootstrap path runs only once.
static SERVER_READY: OnceLock<()> = OnceLock::new();

async fn test_services() -> Services {
    let identity = InMemoryIdentityProvider::new().with_guest_tokens();
    identity
        .insert(
            ADMIN_TOKEN,
            Identity {
                account_id: 1,
                username: "warden".into(),
                is_guest: false,
                is_admin: true,
                is_moderator: false,
            },
        )
        .await;
    identity
        .insert(
            MEMBER_TOKEN,
            Identity {
                account_id: 2,
                username: "drifter".into(),
                is_guest: false,
                is_admin: false,
                is_moderator: false,
            },
        )
        .await;
    identity
        .insert(
            OUTLAW_TOKEN,
            Identity {
                account_id: 3,
                username: "outlaw".into(),
                is_guest: false,
                is_admin: false,
                is_moderator: false,
            },
        )
        .await;

    Services {
        identity: Arc::new(identity),
        stats: Arc::new(InMemoryStatsRepository::new()),
        default_room: "main".into(),
        room_settings: RoomSettings::default(),
    }
}

// Ensure the test server is running and return the shared base URL.
pub fn ensure_server() -> &'static str {
    // Run initialization exactly once even if multiple tests call this function.
    SERVER_READY.get_or_init(|| {
        // Local one-time slot where the server thread publishes its selected URL.
        let published_url = Arc::new(OnceLock::<String>::new());
        let published_url_thread = Arc::clone(&published_url);
        // Spawn an OS thread so the server outlives individual `#[tokio::test]` runtimes.
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("test runtime");
            runtime.block_on(async move {
                // Bind to an ephemeral port to avoid collisions with local services.
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral test port");
                let addr = listener.local_addr().expect("get local addr");
                let _ = published_url_thread.set(format!("http://{}", addr));
                arena_server::run_with_services(listener, test_services().await, std::future::pending())
                    .await
                    .expect("server failed");
            });
        });
        // Block until URL is published and the bound port starts accepting connections.
        wait_for_server_url_and_readiness(published_url);
    });

    SERVER_URL
        .get()
        .expect("server url should be initialized")
        .as_str()
}

/// WebSocket URL for a room on the shared test server.
pub fn ws_url(room: &str) -> String {
    let base = ensure_server();
    let host = base.strip_prefix("http://").expect("base url should use http://");
    format!("ws://{host}/ws?room={room}")
}

/// A room name no other test uses.
pub fn unique_room() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("t-{}", &id[..12])
}

// Wait for URL publication and then wait for the server socket to accept TCP connections.
fn wait_for_server_url_and_readiness(published_url: Arc<OnceLock<String>>) {
    let base_url = loop {
        if let Some(url) = published_url.get() {
            break url.clone();
        }
        std::thread::sleep(Duration::from_millis(10));
    };

    let _ = SERVER_URL.set(base_url.clone());

    let addr = base_url
        .strip_prefix("http://")
        .expect("base url should use http://");

    // Retry for a short period to avoid racing server bind/accept.
    for _ in 0..100 {
        if std::net::TcpStream::connect(addr).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    panic!("server did not become ready in time");
}
