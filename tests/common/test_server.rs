use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::LazyLock;

use tempfile::TempDir;

pub struct TestServer {
    pub temp_dir: TempDir,
    pub base_url: String,
    /// Token and principal id for the default "tester" account.
    pub principal_token: String,
    pub principal_id: String,
    server_process: Option<Child>,
}

static BUILD_RELEASE: LazyLock<()> = LazyLock::new(|| {
    let build_status = Command::new("cargo")
        .args(["build", "--release"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .expect("build release binary");
    assert!(build_status.success(), "Failed to build release binary");
});

fn binary_path() -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("target/release/funnel")
}

impl TestServer {
    pub async fn start() -> Self {
        LazyLock::force(&BUILD_RELEASE);

        let temp_dir = TempDir::new().expect("create temp dir");
        let data_dir = temp_dir.path();

        let init_output = Command::new(binary_path())
            .args(["init", "--data-dir"])
            .arg(data_dir)
            .output()
            .expect("run init");
        assert!(
            init_output.status.success(),
            "Failed to initialize database"
        );

        let (principal_token, principal_id) = create_principal(data_dir, "tester");

        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);

        let base_url = format!("http://127.0.0.1:{}", port);

        let server_process = Command::new(binary_path())
            .args(["serve", "--data-dir"])
            .arg(data_dir)
            .args(["--host", "127.0.0.1", "--port"])
            .arg(port.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("start server");

        Self::wait_for_ready(&base_url).await;

        Self {
            temp_dir,
            base_url,
            principal_token,
            principal_id,
            server_process: Some(server_process),
        }
    }

    /// Mints an additional principal; used by the ownership isolation tests.
    pub fn create_principal(&self, name: &str) -> (String, String) {
        create_principal(self.temp_dir.path(), name)
    }

    async fn wait_for_ready(base_url: &str) {
        let client = reqwest::Client::new();
        for _ in 0..50 {
            if client
                .get(format!("{}/health", base_url))
                .send()
                .await
                .is_ok()
            {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        panic!("Server did not become ready");
    }

    pub fn data_dir(&self) -> &Path {
        self.temp_dir.path()
    }
}

/// Runs `funnel principal create` and returns (token, principal_id).
fn create_principal(data_dir: &Path, name: &str) -> (String, String) {
    let output = Command::new(binary_path())
        .args(["principal", "create", "--name", name, "--data-dir"])
        .arg(data_dir)
        .output()
        .expect("run principal create");
    assert!(output.status.success(), "Failed to create principal");

    let stdout = String::from_utf8(output.stdout).expect("principal create output");
    let principal_id = stdout
        .lines()
        .find_map(|line| line.strip_prefix("Principal ID: "))
        .expect("principal id in output")
        .trim()
        .to_string();

    let token_path = data_dir.join(format!(".{name}_token"));
    let token = std::fs::read_to_string(&token_path)
        .expect("read principal token")
        .trim()
        .to_string();

    (token, principal_id)
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(mut process) = self.server_process.take() {
            let _ = process.kill();
            let _ = process.wait();
        }
    }
}
