fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    use shelfdrop_protocol::{ErrorKind, UploadMetadata};
    use shelfdrop_transfer::Asset;
    use shelfdrop_tus::{TusClient, TusConfig};
    use shelfdrop_uploader::{BatchResult, ResumableEndpoint, UploadCoordinator, UploaderConfig};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    const TOKEN: &str = "service-key";
    const RESUMABLE: &str = "/storage/v1/upload/resumable";

    /// Scripted outcome of the next PATCH.
    #[derive(Debug, Clone, Copy)]
    enum Patch {
        Unavailable,
        /// Store the bytes, then close the connection without answering.
        DropAfterApply,
    }

    struct StoredUpload {
        length: u64,
        metadata: String,
        data: Vec<u8>,
    }

    #[derive(Default)]
    struct ServerState {
        uploads: HashMap<String, StoredUpload>,
        next_id: usize,
        patches: VecDeque<Patch>,
        requests: Vec<String>,
    }

    struct Request {
        method: String,
        path: String,
        headers: HashMap<String, String>,
        body: Vec<u8>,
    }

    impl Request {
        fn header(&self, name: &str) -> Option<&str> {
            self.headers.get(name).map(String::as_str)
        }
    }

    enum Reply {
        Respond(String),
        Drop,
    }

    /// In-process tus 1.0.0 server with Supabase storage paths.
    #[derive(Clone, Default)]
    struct TusServer {
        state: Arc<Mutex<ServerState>>,
    }

    impl TusServer {
        async fn start(&self) -> (String, tokio::task::JoinHandle<()>) {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let port = listener.local_addr().unwrap().port();
            let server = self.clone();
            let handle = tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let server = server.clone();
                    tokio::spawn(async move { server.serve(stream).await });
                }
            });
            (format!("http://127.0.0.1:{port}"), handle)
        }

        fn script_patches(&self, patches: &[Patch]) {
            self.state.lock().unwrap().patches.extend(patches);
        }

        fn requests(&self) -> Vec<String> {
            self.state.lock().unwrap().requests.clone()
        }

        fn count(&self, method: &str) -> usize {
            self.requests()
                .iter()
                .filter(|r| r.starts_with(&format!("{method} ")))
                .count()
        }

        /// Stored bytes and decoded metadata of the upload for `object`.
        fn object(&self, object: &str) -> Option<(Vec<u8>, UploadMetadata)> {
            let state = self.state.lock().unwrap();
            state.uploads.values().find_map(|u| {
                let meta = UploadMetadata::from_header(&u.metadata, u.length).ok()?;
                (meta.object_name == object).then(|| (u.data.clone(), meta))
            })
        }

        /// Every upload created for `object`, in no particular order.
        fn objects(&self, object: &str) -> Vec<(Vec<u8>, UploadMetadata)> {
            let state = self.state.lock().unwrap();
            state
                .uploads
                .values()
                .filter_map(|u| {
                    let meta = UploadMetadata::from_header(&u.metadata, u.length).ok()?;
                    (meta.object_name == object).then(|| (u.data.clone(), meta))
                })
                .collect()
        }

        async fn serve(&self, mut stream: TcpStream) {
            let Some(req) = read_request(&mut stream).await else {
                return;
            };
            match self.handle(&req) {
                Reply::Respond(resp) => {
                    let _ = stream.write_all(resp.as_bytes()).await;
                    let _ = stream.shutdown().await;
                }
                Reply::Drop => drop(stream),
            }
        }

        fn handle(&self, req: &Request) -> Reply {
            let mut state = self.state.lock().unwrap();
            state.requests.push(format!("{} {}", req.method, req.path));

            let bearer = format!("Bearer {TOKEN}");
            if req.header("authorization") != Some(bearer.as_str()) {
                return Reply::Respond(response("401 Unauthorized", &[]));
            }
            if req.header("tus-resumable") != Some("1.0.0") {
                return Reply::Respond(response("412 Precondition Failed", &[]));
            }

            match req.method.as_str() {
                "POST" if req.path == RESUMABLE => {
                    let Some(length) = req.header("upload-length").and_then(|v| v.parse().ok())
                    else {
                        return Reply::Respond(response("400 Bad Request", &[]));
                    };
                    let id = state.next_id;
                    state.next_id += 1;
                    let path = format!("{RESUMABLE}/{id}");
                    state.uploads.insert(
                        path.clone(),
                        StoredUpload {
                            length,
                            metadata: req.header("upload-metadata").unwrap_or_default().to_string(),
                            data: Vec::new(),
                        },
                    );
                    Reply::Respond(response("201 Created", &[format!("Location: {path}").as_str()]))
                }
                "HEAD" => match state.uploads.get(&req.path) {
                    Some(u) => Reply::Respond(response(
                        "200 OK",
                        &[
                            format!("Upload-Offset: {}", u.data.len()).as_str(),
                            format!("Upload-Length: {}", u.length).as_str(),
                        ],
                    )),
                    None => Reply::Respond(response("404 Not Found", &[])),
                },
                "PATCH" => {
                    if req.header("content-type") != Some("application/offset+octet-stream") {
                        return Reply::Respond(response("415 Unsupported Media Type", &[]));
                    }
                    let offset: Option<u64> =
                        req.header("upload-offset").and_then(|v| v.parse().ok());
                    let script = state.patches.pop_front();
                    let Some(upload) = state.uploads.get_mut(&req.path) else {
                        return Reply::Respond(response("404 Not Found", &[]));
                    };
                    if offset != Some(upload.data.len() as u64) {
                        return Reply::Respond(response("409 Conflict", &[]));
                    }
                    if matches!(script, Some(Patch::Unavailable)) {
                        return Reply::Respond(response("503 Service Unavailable", &[]));
                    }
                    upload.data.extend_from_slice(&req.body);
                    if matches!(script, Some(Patch::DropAfterApply)) {
                        return Reply::Drop;
                    }
                    Reply::Respond(response(
                        "204 No Content",
                        &[format!("Upload-Offset: {}", upload.data.len()).as_str()],
                    ))
                }
                _ => Reply::Respond(response("405 Method Not Allowed", &[])),
            }
        }
    }

    fn response(status: &str, headers: &[&str]) -> String {
        let mut resp = format!("HTTP/1.1 {status}\r\nTus-Resumable: 1.0.0\r\n");
        for h in headers {
            resp.push_str(h);
            resp.push_str("\r\n");
        }
        resp.push_str("Content-Length: 0\r\nConnection: close\r\n\r\n");
        resp
    }

    async fn read_request(stream: &mut TcpStream) -> Option<Request> {
        let mut buf = Vec::new();
        let mut tmp = [0u8; 16 * 1024];
        let head_end = loop {
            let n = stream.read(&mut tmp).await.ok()?;
            if n == 0 {
                return None;
            }
            buf.extend_from_slice(&tmp[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
        let mut lines = head.lines();
        let mut request_line = lines.next()?.split_whitespace();
        let method = request_line.next()?.to_string();
        let path = request_line.next()?.to_string();
        let headers: HashMap<String, String> = lines
            .filter_map(|l| l.split_once(':'))
            .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
            .collect();

        let length: usize = headers
            .get("content-length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        while buf.len() < head_end + length {
            let n = stream.read(&mut tmp).await.ok()?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&tmp[..n]);
        }

        Some(Request {
            method,
            path,
            headers,
            body: buf[head_end..].to_vec(),
        })
    }

    fn payload(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
    }

    fn config(chunk_size: u64, delays: Vec<u64>) -> UploaderConfig {
        UploaderConfig::default()
            .with_chunk_size(chunk_size)
            .with_retry_delays_ms(delays)
    }

    fn client(url: &str, token: &str) -> Arc<TusClient> {
        Arc::new(TusClient::new(TusConfig::new(url, token)).unwrap())
    }

    async fn upload(
        client: Arc<TusClient>,
        config: UploaderConfig,
        assets: Vec<Asset>,
    ) -> BatchResult {
        UploadCoordinator::new(client, config).submit_batch(assets).await
    }

    #[tokio::test]
    async fn batch_round_trip() {
        let server = TusServer::default();
        let (url, handle) = server.start().await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sofa.png");
        std::fs::write(&path, payload(2500, 3)).unwrap();

        let assets = vec![
            Asset::from_bytes("file:///photos/chair.jpg", payload(1000, 1), "images"),
            Asset::from_path(&path, "images").await.unwrap(),
            Asset::from_bytes("lamp.webp", payload(10, 2), "images")
                .with_object_name("listing-7/lamp.webp"),
        ];
        let results = upload(client(&url, TOKEN), config(1000, vec![0]), assets).await;

        assert_eq!(
            results.public_addresses().unwrap(),
            vec![
                format!("{url}/storage/v1/object/public/images/chair.jpg"),
                format!("{url}/storage/v1/object/public/images/sofa.png"),
                format!("{url}/storage/v1/object/public/images/listing-7/lamp.webp"),
            ]
        );

        let (data, meta) = server.object("chair.jpg").unwrap();
        assert_eq!(data, payload(1000, 1));
        assert_eq!(meta.bucket_name, "images");
        assert_eq!(meta.content_type, "image/jpeg");
        assert_eq!(meta.cache_control, "3600");

        let (data, meta) = server.object("sofa.png").unwrap();
        assert_eq!(data, payload(2500, 3));
        assert_eq!(meta.content_type, "image/png");
        assert_eq!(meta.total_length, 2500);

        assert_eq!(server.count("POST"), 3);
        // 1 + 3 + 1 chunks.
        assert_eq!(server.count("PATCH"), 5);

        let json = serde_json::to_value(&results).unwrap();
        assert_eq!(json[0]["ok"], true);

        handle.abort();
    }

    #[tokio::test]
    async fn transient_errors_are_retried() {
        let server = TusServer::default();
        server.script_patches(&[Patch::Unavailable, Patch::Unavailable]);
        let (url, handle) = server.start().await;

        let assets = vec![Asset::from_bytes("a.jpg", payload(1500, 0), "images")];
        let results = upload(client(&url, TOKEN), config(1000, vec![0, 5, 5]), assets).await;

        assert!(results.all_succeeded());
        assert_eq!(server.object("a.jpg").unwrap().0, payload(1500, 0));
        assert_eq!(server.count("PATCH"), 4);
        assert_eq!(server.count("HEAD"), 2);

        handle.abort();
    }

    #[tokio::test]
    async fn lost_acknowledgement_does_not_duplicate_bytes() {
        let server = TusServer::default();
        server.script_patches(&[Patch::DropAfterApply]);
        let (url, handle) = server.start().await;

        let assets = vec![Asset::from_bytes("a.jpg", payload(1500, 9), "images")];
        let results = upload(client(&url, TOKEN), config(1000, vec![0]), assets).await;

        assert!(results.all_succeeded());
        assert_eq!(server.object("a.jpg").unwrap().0, payload(1500, 9));
        assert_eq!(server.count("PATCH"), 2);

        handle.abort();
    }

    #[tokio::test]
    async fn invalid_credential_fails_without_retries() {
        let server = TusServer::default();
        let (url, handle) = server.start().await;

        let assets = vec![
            Asset::from_bytes("a.jpg", payload(10, 0), "images"),
            Asset::from_bytes("b.jpg", payload(10, 0), "images"),
        ];
        let results = upload(client(&url, "wrong"), config(1000, vec![0, 0, 0]), assets).await;

        assert_eq!(results.len(), 2);
        assert!(
            results
                .iter()
                .all(|r| r.error_kind() == Some(ErrorKind::AuthError))
        );
        assert_eq!(results.public_addresses(), None);
        assert_eq!(server.count("POST"), 2);
        assert_eq!(server.count("PATCH"), 0);

        handle.abort();
    }

    #[tokio::test]
    async fn failed_batch_resumes_on_resubmit() {
        let server = TusServer::default();
        let (url, handle) = server.start().await;
        let client = client(&url, TOKEN);
        let asset = Asset::from_bytes("big.jpg", payload(2500, 5), "images");

        // The first chunk lands but its acknowledgement is lost, with no
        // retries allowed.
        server.script_patches(&[Patch::DropAfterApply]);
        let first = upload(client.clone(), config(1000, vec![]), vec![asset.clone()]).await;
        assert_eq!(
            first.get(0).unwrap().error_kind(),
            Some(ErrorKind::RetriesExhausted)
        );
        assert_eq!(server.object("big.jpg").unwrap().0.len(), 1000);

        let second = upload(client.clone(), config(1000, vec![0]), vec![asset.clone()]).await;
        assert!(second.all_succeeded());
        assert_eq!(server.object("big.jpg").unwrap().0, payload(2500, 5));
        assert_eq!(server.count("POST"), 1);

        // The completed upload is no longer offered for resumption.
        assert!(client.find_resumable_upload(&asset.fingerprint()).await.is_none());

        handle.abort();
    }

    #[tokio::test]
    async fn resubmit_after_size_change_starts_over() {
        let server = TusServer::default();
        let (url, handle) = server.start().await;
        let client = client(&url, TOKEN);

        server.script_patches(&[Patch::DropAfterApply]);
        let original = Asset::from_bytes("photo.jpg", payload(2500, 4), "images");
        let first = upload(client.clone(), config(1000, vec![]), vec![original]).await;
        assert_eq!(
            first.get(0).unwrap().error_kind(),
            Some(ErrorKind::RetriesExhausted)
        );

        // Same source and object name, different payload.
        let edited = Asset::from_bytes("photo.jpg", payload(1500, 8), "images");
        let second = upload(client.clone(), config(1000, vec![0]), vec![edited.clone()]).await;
        assert!(second.all_succeeded());
        assert_eq!(server.count("POST"), 2);

        let mut uploads = server.objects("photo.jpg");
        uploads.sort_by_key(|(_, meta)| meta.total_length);
        assert_eq!(uploads.len(), 2);
        assert_eq!(uploads[0].0, payload(1500, 8));
        assert_eq!(uploads[0].1.total_length, 1500);
        // The abandoned upload keeps only what it had received.
        assert_eq!(uploads[1].0.len(), 1000);
        assert_eq!(uploads[1].1.total_length, 2500);

        assert!(client.find_resumable_upload(&edited.fingerprint()).await.is_none());

        handle.abort();
    }

    #[tokio::test]
    async fn mixed_batch_keeps_order() {
        let server = TusServer::default();
        let (url, handle) = server.start().await;

        let assets = vec![
            Asset::from_bytes("a.jpg", payload(10, 0), "images"),
            Asset::from_bytes("b.jpg", payload(10, 0), "images").with_content_type("jpeg"),
            Asset::from_bytes("c.jpg", payload(10, 0), "images"),
        ];
        let results = upload(client(&url, TOKEN), config(1000, vec![0]), assets).await;

        assert!(results.get(0).unwrap().is_ok());
        assert_eq!(
            results.get(1).unwrap().error_kind(),
            Some(ErrorKind::ValidationError)
        );
        assert!(results.get(2).unwrap().is_ok());
        assert_eq!(server.count("POST"), 2);

        handle.abort();
    }
}
