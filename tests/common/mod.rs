use std::sync::Arc;
use std::time::Duration;

use current_location_rs::{
    auth::TokenVerifier,
    create_app, location_state,
    models::{Member, MemberId},
    repositories::{InMemoryLocationRepository, InMemoryMemberRepository, MemberRepository},
    HttpLimits, Metrics,
};
use reqwest::Client;
use tokio::net::TcpListener;

pub const TEST_SECRET: &[u8] = b"integration-test-secret";

/// Parent and child in one family
pub const PARENT_ID: MemberId = 1;
pub const CHILD_ID: MemberId = 2;
/// Member of another family
pub const STRANGER_ID: MemberId = 3;

pub struct TestEnvironment {
    pub client: Client,
    pub base_url: String,
    pub members: Arc<InMemoryMemberRepository>,
    verifier: TokenVerifier,
}

impl TestEnvironment {
    pub async fn new() -> Self {
        let members = Arc::new(InMemoryMemberRepository::with_members([
            Member::new(PARENT_ID, "parent", "FAM-A"),
            Member::new(CHILD_ID, "child", "FAM-A"),
            Member::new(STRANGER_ID, "stranger", "FAM-B"),
        ]));

        let metrics = Arc::new(Metrics::new().expect("Failed to create metrics"));
        let state = location_state(
            Arc::new(InMemoryLocationRepository::new()),
            members.clone(),
            metrics.clone(),
        );
        let app = create_app(
            metrics,
            state,
            Arc::new(TokenVerifier::new(TEST_SECRET, 0)),
            HttpLimits {
                request_timeout: Duration::from_secs(5),
                max_request_size: 64 * 1024,
            },
        );

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind listener");
        let addr = listener.local_addr().expect("Failed to get local address");
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Failed to serve app");
        });

        Self {
            client: Client::new(),
            base_url,
            members,
            verifier: TokenVerifier::new(TEST_SECRET, 0),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn token_for(&self, member_id: MemberId) -> String {
        self.verifier
            .issue(member_id, chrono::Duration::minutes(5))
            .expect("Failed to issue token")
    }

    pub async fn moving_state_flag(&self, member_id: MemberId) -> i32 {
        self.members
            .find_by_id(member_id)
            .await
            .expect("Failed to read member")
            .expect("Member not seeded")
            .moving_state
            .as_flag()
    }
}
