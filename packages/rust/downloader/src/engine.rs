//! Per-file streaming download engine.
//!
//! Each candidate goes through exactly one of three terminal states:
//! skipped (file already present), completed, or failed with the partial
//! file removed. Nothing is retried and a failure never stops the caller
//! from moving on to the next candidate.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use percent_encoding::percent_decode_str;
use tracing::{debug, info, warn};
use url::Url;

use nimefetch_shared::{DownloadOutcome, NimeFetchError, Result, error_chain};

/// Write granularity for paper bodies.
pub const CHUNK_SIZE: usize = 8192;

// ---------------------------------------------------------------------------
// Downloader
// ---------------------------------------------------------------------------

/// Downloads candidates into a single destination directory.
pub struct Downloader {
    client: Client,
    dest_dir: PathBuf,
    timeout: Duration,
}

impl Downloader {
    /// Create a downloader writing into `dest_dir`.
    ///
    /// `timeout` bounds waiting for the response headers and every wait for
    /// the next body chunk. A slow transfer that keeps delivering data is not
    /// cut off.
    pub fn new(client: Client, dest_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            client,
            dest_dir: dest_dir.into(),
            timeout,
        }
    }

    /// Terminal state reachable without a request: a URL with no file name,
    /// or a file of the same name already on disk. `None` means `download`
    /// will go to the network.
    pub fn precheck(&self, url: &str) -> Option<DownloadOutcome> {
        let Some(filename) = filename_from_url(url) else {
            warn!(%url, "no filename in URL, skipping");
            return Some(DownloadOutcome::Failed {
                filename: url.to_string(),
                message: "URL has no file name".into(),
            });
        };

        if self.dest_dir.join(&filename).exists() {
            info!(%filename, "already downloaded, skipping");
            return Some(DownloadOutcome::Skipped { filename });
        }
        None
    }

    /// Bring one candidate to a terminal state.
    pub async fn download(&self, url: &str) -> DownloadOutcome {
        if let Some(outcome) = self.precheck(url) {
            return outcome;
        }
        // precheck returned None, so the name is present.
        let filename = filename_from_url(url).unwrap_or_default();
        let save_path = self.dest_dir.join(&filename);

        debug!(%url, path = %save_path.display(), "downloading");

        match self.fetch_to_file(url, &filename, &save_path).await {
            Ok(bytes) => {
                info!(%filename, bytes, "download complete");
                DownloadOutcome::Completed { filename, bytes }
            }
            Err(e) => {
                warn!(%filename, error = %e, "download failed");
                remove_partial(&save_path).await;
                let message = match e {
                    NimeFetchError::Download { message, .. } => message,
                    other => error_chain(&other),
                };
                DownloadOutcome::Failed { filename, message }
            }
        }
    }

    /// GET `url` and stream the body into `save_path`. Returns bytes written.
    async fn fetch_to_file(&self, url: &str, filename: &str, save_path: &Path) -> Result<u64> {
        let fail = |msg: String| NimeFetchError::download(filename, msg);

        let mut response = tokio::time::timeout(self.timeout, self.client.get(url).send())
            .await
            .map_err(|_| fail(format!("timed out after {:?} waiting for a response", self.timeout)))?
            .map_err(|e| fail(error_chain(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fail(format!("HTTP {status}")));
        }

        let file = File::create(save_path)
            .await
            .map_err(|e| fail(format!("cannot create {}: {e}", save_path.display())))?;
        let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);
        let mut written: u64 = 0;

        loop {
            let next = tokio::time::timeout(self.timeout, response.chunk())
                .await
                .map_err(|_| {
                    fail(format!(
                        "timed out after {:?} without data ({written} bytes received)",
                        self.timeout
                    ))
                })?
                .map_err(|e| fail(error_chain(&e)))?;
            let Some(chunk) = next else { break };

            writer
                .write_all(&chunk)
                .await
                .map_err(|e| fail(format!("write failed: {e}")))?;
            written += chunk.len() as u64;
        }

        writer
            .flush()
            .await
            .map_err(|e| fail(format!("write failed: {e}")))?;

        Ok(written)
    }
}

/// Delete a partially written file. A missing file is not an error.
async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed partial file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "could not remove partial file"),
    }
}

// ---------------------------------------------------------------------------
// Naming
// ---------------------------------------------------------------------------

/// Final path segment of `url`, percent-decoded.
///
/// `https://nime.org/2025/my%20paper.pdf` names `my paper.pdf`. Returns `None`
/// if the URL cannot be parsed, its path ends in `/`, or the decoded name
/// would escape the destination directory.
pub fn filename_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path().rsplit('/').next()?;
    let name = percent_decode_str(segment).decode_utf8_lossy();

    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return None;
    }
    Some(name.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use uuid::Uuid;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("nf-{tag}-{}", Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn downloader(dir: &Path) -> Downloader {
        Downloader::new(Client::new(), dir, Duration::from_secs(5))
    }

    /// Serves one response that promises `promised` bytes, sends `sent`, then hangs up.
    async fn truncating_server(promised: usize, sent: usize) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/pdf\r\nContent-Length: {promised}\r\n\r\n"
                );
                let _ = stream.write_all(head.as_bytes()).await;
                let _ = stream.write_all(&vec![b'%'; sent]).await;
                let _ = stream.flush().await;
                // dropping the stream closes the connection mid-body
            }
        });

        format!("http://{addr}")
    }

    /// Serves `pieces` chunks of `piece_len` bytes, pausing `gap` before each one.
    async fn trickling_server(pieces: usize, piece_len: usize, gap: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/pdf\r\nContent-Length: {}\r\n\r\n",
                    pieces * piece_len
                );
                let _ = stream.write_all(head.as_bytes()).await;
                let _ = stream.flush().await;
                for _ in 0..pieces {
                    tokio::time::sleep(gap).await;
                    let _ = stream.write_all(&vec![b'%'; piece_len]).await;
                    let _ = stream.flush().await;
                }
            }
        });

        format!("http://{addr}")
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(
            filename_from_url("https://nime.org/proceedings/2025/nime2025_1.pdf").as_deref(),
            Some("nime2025_1.pdf")
        );
        assert_eq!(
            filename_from_url("https://nime.org/2025/notes/c.PDF").as_deref(),
            Some("c.PDF")
        );
        assert_eq!(
            filename_from_url("https://nime.org/2025/my%20paper.pdf").as_deref(),
            Some("my paper.pdf")
        );
        assert_eq!(filename_from_url("https://nime.org/2025/"), None);
        assert_eq!(filename_from_url("https://nime.org/2025/..%2Fescape.pdf"), None);
        assert_eq!(filename_from_url("https://nime.org/2025/a%5Cb.pdf"), None);
        assert_eq!(filename_from_url("not a url"), None);
    }

    #[tokio::test]
    async fn test_download_writes_full_body() {
        let server = wiremock::MockServer::start().await;
        let body: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/2025/a.pdf"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let dir = temp_dir("dl-ok");
        let outcome = downloader(&dir)
            .download(&format!("{}/2025/a.pdf", server.uri()))
            .await;

        assert_eq!(
            outcome,
            DownloadOutcome::Completed {
                filename: "a.pdf".into(),
                bytes: body.len() as u64,
            }
        );
        assert_eq!(std::fs::read(dir.join("a.pdf")).unwrap(), body);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_existing_file_is_skipped_without_request() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::any())
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("new"))
            .expect(0)
            .mount(&server)
            .await;

        let dir = temp_dir("dl-skip");
        // A truncated earlier download still counts as present.
        std::fs::write(dir.join("a.pdf"), b"%PDF-1.").unwrap();

        let outcome = downloader(&dir)
            .download(&format!("{}/2025/a.pdf", server.uri()))
            .await;

        assert_eq!(
            outcome,
            DownloadOutcome::Skipped {
                filename: "a.pdf".into()
            }
        );
        assert_eq!(std::fs::read(dir.join("a.pdf")).unwrap(), b"%PDF-1.");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_http_error_leaves_no_file() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = temp_dir("dl-404");
        let outcome = downloader(&dir)
            .download(&format!("{}/2025/missing.pdf", server.uri()))
            .await;

        match outcome {
            DownloadOutcome::Failed { filename, message } => {
                assert_eq!(filename, "missing.pdf");
                assert!(message.contains("404"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        assert!(!dir.join("missing.pdf").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_connection_drop_mid_stream_removes_partial_file() {
        let base = truncating_server(64 * 1024, 3 * CHUNK_SIZE).await;

        let dir = temp_dir("dl-drop");
        let outcome = downloader(&dir)
            .download(&format!("{base}/2025/dropped.pdf"))
            .await;

        assert!(matches!(outcome, DownloadOutcome::Failed { .. }), "got {outcome:?}");
        assert!(!dir.join("dropped.pdf").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_timeout_is_per_file_failure() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_string("%PDF")
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let dir = temp_dir("dl-timeout");
        let slow = Downloader::new(Client::new(), &dir, Duration::from_millis(50));
        let outcome = slow.download(&format!("{}/2025/slow.pdf", server.uri())).await;

        match outcome {
            DownloadOutcome::Failed { message, .. } => assert!(message.contains("timed out"), "{message}"),
            other => panic!("expected Failed, got {other:?}"),
        }
        assert!(!dir.join("slow.pdf").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_unwritable_destination_is_per_file_failure() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("%PDF"))
            .mount(&server)
            .await;

        let dir = std::env::temp_dir().join(format!("nf-absent-{}", Uuid::now_v7()));
        let outcome = downloader(&dir)
            .download(&format!("{}/2025/a.pdf", server.uri()))
            .await;

        match outcome {
            DownloadOutcome::Failed { message, .. } => assert!(message.contains("cannot create")),
            other => panic!("expected Failed, got {other:?}"),
        }
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_slow_steady_body_is_not_cut_off() {
        // Eight gaps of 100 ms, each under the 300 ms limit, about 800 ms in total.
        let base = trickling_server(8, 1000, Duration::from_millis(100)).await;

        let dir = temp_dir("dl-trickle");
        let dl = Downloader::new(Client::new(), &dir, Duration::from_millis(300));
        let outcome = dl.download(&format!("{base}/2025/slow.pdf")).await;

        assert_eq!(
            outcome,
            DownloadOutcome::Completed {
                filename: "slow.pdf".into(),
                bytes: 8000,
            }
        );
        assert_eq!(std::fs::metadata(dir.join("slow.pdf")).unwrap().len(), 8000);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_stalled_body_times_out_and_removes_partial_file() {
        // Headers arrive at once, the body stalls past the limit.
        let base = trickling_server(2, 1000, Duration::from_millis(400)).await;

        let dir = temp_dir("dl-stall");
        let dl = Downloader::new(Client::new(), &dir, Duration::from_millis(150));
        let outcome = dl.download(&format!("{base}/2025/stall.pdf")).await;

        match outcome {
            DownloadOutcome::Failed { message, .. } => assert!(message.contains("timed out"), "{message}"),
            other => panic!("expected Failed, got {other:?}"),
        }
        assert!(!dir.join("stall.pdf").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_refused_connection_reports_cause() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let dir = temp_dir("dl-refused");
        let outcome = downloader(&dir)
            .download(&format!("http://{addr}/2025/a.pdf"))
            .await;

        match outcome {
            DownloadOutcome::Failed { message, .. } => {
                assert!(message.to_lowercase().contains("refused"), "{message}");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        assert!(!dir.join("a.pdf").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_precheck_skips_existing_file() {
        let dir = temp_dir("dl-precheck");
        std::fs::write(dir.join("a.pdf"), b"%PDF").unwrap();
        let dl = downloader(&dir);

        assert_eq!(
            dl.precheck("https://nime.org/2025/a.pdf"),
            Some(DownloadOutcome::Skipped {
                filename: "a.pdf".into()
            })
        );
        assert_eq!(dl.precheck("https://nime.org/2025/b.pdf"), None);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
