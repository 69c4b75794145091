use super::codec::{Frame, Transport};
use super::pool::ConnectionPool;
use crate::ports::transformer::{ChunkStream, RpcError, TransformRequest, TransformerClient};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RpcTransformerClient {
    pool: Arc<ConnectionPool>,
}

impl RpcTransformerClient {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }
}

/// Read side of one call. Holds the connection until end-of-stream hands it
/// back to the pool; any other exit drops it.
struct ChunkReader {
    conn: Option<Transport>,
    addr: String,
    pool: Arc<ConnectionPool>,
}

impl ChunkReader {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, RpcError> {
        let received = match self.conn.as_mut() {
            Some(conn) => conn.next().await,
            None => return Ok(None),
        };

        let raw = match received {
            Some(Ok(raw)) => raw,
            Some(Err(e)) => {
                self.conn = None;
                return Err(e.into());
            }
            None => {
                self.conn = None;
                return Err(RpcError::UnexpectedEof);
            }
        };

        match Frame::decode(raw) {
            Ok(Frame::Chunk(chunk)) => Ok(Some(chunk)),
            Ok(Frame::End) => {
                if let Some(conn) = self.conn.take() {
                    self.pool.checkin(&self.addr, conn);
                }
                Ok(None)
            }
            Ok(Frame::Error(message)) => {
                self.conn = None;
                Err(RpcError::Remote(message))
            }
            Err(e) => {
                self.conn = None;
                Err(e)
            }
        }
    }
}

impl RpcTransformerClient {
    /// Send the request and read up to the first response frame.
    async fn start(
        &self,
        addr: &str,
        mut conn: Transport,
        payload: Bytes,
    ) -> Result<(ChunkReader, Option<Bytes>), RpcError> {
        conn.send(payload).await?;
        let mut reader = ChunkReader {
            conn: Some(conn),
            addr: addr.to_string(),
            pool: self.pool.clone(),
        };
        let first = reader.next_chunk().await?;
        Ok((reader, first))
    }
}

/// Failures a pooled connection shows when the service already closed it.
fn is_stale(e: &RpcError) -> bool {
    matches!(e, RpcError::Io(_) | RpcError::UnexpectedEof)
}

#[async_trait]
impl TransformerClient for RpcTransformerClient {
    async fn transform(
        &self,
        addr: &str,
        request: TransformRequest,
    ) -> Result<ChunkStream, RpcError> {
        let payload = Bytes::from(
            serde_json::to_vec(&request).map_err(|e| RpcError::Protocol(e.to_string()))?,
        );

        let (conn, reused) = self.pool.checkout(addr).await?;
        let (reader, first) = match self.start(addr, conn, payload.clone()).await {
            Err(e) if reused && is_stale(&e) => {
                // the service closed the idle connection; one fresh attempt
                tracing::debug!(addr, error = %e, "pooled connection is stale, reconnecting");
                let conn = self.pool.connect(addr).await?;
                self.start(addr, conn, payload).await?
            }
            started => started?,
        };

        let rest = futures::stream::try_unfold(reader, |mut reader| async move {
            Ok::<_, RpcError>(reader.next_chunk().await?.map(|chunk| (chunk, reader)))
        });
        Ok(futures::stream::iter(first.map(Ok::<_, RpcError>))
            .chain(rest)
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::super::codec::transport;
    use super::*;
    use futures::TryStreamExt;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// Accepts connections and answers every request with `frames`, reporting
    /// each decoded request on the channel.
    async fn fake_service(
        frames: Vec<Frame>,
    ) -> (String, mpsc::UnboundedReceiver<TransformRequest>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => return,
                };
                let tx = tx.clone();
                let frames = frames.clone();
                tokio::spawn(async move {
                    let mut conn = transport(stream, 1024 * 1024);
                    while let Some(Ok(raw)) = conn.next().await {
                        let request: TransformRequest = serde_json::from_slice(&raw).unwrap();
                        tx.send(request).unwrap();
                        for frame in &frames {
                            if conn.send(frame.encode()).await.is_err() {
                                return;
                            }
                        }
                        if !frames.contains(&Frame::End) {
                            return;
                        }
                    }
                });
            }
        });

        (addr, rx)
    }

    /// Answers a single call per connection with one chunk, then hangs up.
    async fn closing_service() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut conn = transport(stream, 1024 * 1024);
                    if let Some(Ok(_)) = conn.next().await {
                        let _ = conn.send(Frame::Chunk(Bytes::from_static(b"ok")).encode()).await;
                        let _ = conn.send(Frame::End.encode()).await;
                    }
                });
            }
        });

        addr
    }

    fn request() -> TransformRequest {
        TransformRequest {
            video_path: "vid/v0/segment1.m4s".to_string(),
            filter_chain: vec!["gray".to_string(), "flip".to_string()],
        }
    }

    #[tokio::test]
    async fn test_stream_chunks_in_order_and_reuse_connection() {
        let (addr, mut requests) = fake_service(vec![
            Frame::Chunk(Bytes::from_static(b"ab")),
            Frame::Chunk(Bytes::from_static(b"cd")),
            Frame::End,
        ])
        .await;
        let client = RpcTransformerClient::new(Arc::new(ConnectionPool::new(4)));

        let chunks: Vec<Bytes> = client
            .transform(&addr, request())
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(chunks, vec![Bytes::from_static(b"ab"), Bytes::from_static(b"cd")]);
        assert_eq!(requests.recv().await.unwrap(), request());
        assert_eq!(client.pool().idle_count(&addr), 1);

        // second call runs on the pooled connection
        let chunks: Vec<Bytes> = client
            .transform(&addr, request())
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(client.pool().idle_count(&addr), 1);
    }

    #[tokio::test]
    async fn test_remote_error_fails_stream_and_drops_connection() {
        let (addr, _requests) = fake_service(vec![
            Frame::Chunk(Bytes::from_static(b"ab")),
            Frame::Error("filter crashed".to_string()),
        ])
        .await;
        let client = RpcTransformerClient::new(Arc::new(ConnectionPool::new(4)));

        let result: Result<Vec<Bytes>, RpcError> = client
            .transform(&addr, request())
            .await
            .unwrap()
            .try_collect()
            .await;
        assert!(matches!(result, Err(RpcError::Remote(msg)) if msg == "filter crashed"));
        assert_eq!(client.pool().idle_count(&addr), 0);
    }

    #[tokio::test]
    async fn test_close_without_end_of_stream_is_an_error() {
        let (addr, _requests) =
            fake_service(vec![Frame::Chunk(Bytes::from_static(b"partial"))]).await;
        let client = RpcTransformerClient::new(Arc::new(ConnectionPool::new(4)));

        let result: Result<Vec<Bytes>, RpcError> = client
            .transform(&addr, request())
            .await
            .unwrap()
            .try_collect()
            .await;
        assert!(matches!(result, Err(RpcError::UnexpectedEof)));
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let client = RpcTransformerClient::new(Arc::new(ConnectionPool::new(4)));
        let result = client.transform(&addr, request()).await;
        assert!(matches!(result, Err(RpcError::Connect { .. })));
    }

    #[tokio::test]
    async fn test_shutdown_stops_pooling() {
        let (addr, _requests) = fake_service(vec![Frame::End]).await;
        let client = RpcTransformerClient::new(Arc::new(ConnectionPool::new(4)));

        let _: Vec<Bytes> = client
            .transform(&addr, request())
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(client.pool().idle_count(&addr), 1);

        client.pool().shutdown();
        assert_eq!(client.pool().idle_count(&addr), 0);

        let _: Vec<Bytes> = client
            .transform(&addr, request())
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(client.pool().idle_count(&addr), 0);
    }

    #[tokio::test]
    async fn test_reconnects_when_pooled_connection_was_closed() {
        let addr = closing_service().await;
        let client = RpcTransformerClient::new(Arc::new(ConnectionPool::new(4)));

        for _ in 0..3 {
            let chunks: Vec<Bytes> = client
                .transform(&addr, request())
                .await
                .unwrap()
                .try_collect()
                .await
                .unwrap();
            assert_eq!(chunks, vec![Bytes::from_static(b"ok")]);
            // give the service time to hang up the pooled connection
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
    }

    #[tokio::test]
    async fn test_fresh_connection_is_not_retried() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let accepted = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = accepted.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                drop(stream);
            }
        });

        let client = RpcTransformerClient::new(Arc::new(ConnectionPool::new(4)));
        let result = client.transform(&addr, request()).await;
        assert!(result.is_err());
        assert_eq!(accepted.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_frame_over_configured_cap_fails() {
        let (addr, _requests) = fake_service(vec![
            Frame::Chunk(Bytes::from(vec![7u8; 4096])),
            Frame::End,
        ])
        .await;
        let pool = ConnectionPool::new(4).with_max_frame_length(1024);
        let client = RpcTransformerClient::new(Arc::new(pool));

        let result = client.transform(&addr, request()).await;
        assert!(matches!(result, Err(RpcError::Io(_))));
        assert_eq!(client.pool().idle_count(&addr), 0);
    }
}
