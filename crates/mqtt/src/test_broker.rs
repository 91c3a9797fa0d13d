//! Minimal MQTT 3.1.1 broker on loopback for tests.
//!
//! Accepts one client, answers CONNECT with a fixed return code, acknowledges
//! QoS 1 publishes, and reports each received payload on a channel.

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::mpsc,
};

pub(crate) struct TestBroker {
    port: u16,
    published: mpsc::UnboundedReceiver<(String, Vec<u8>)>,
}

impl TestBroker {
    pub(crate) async fn accepting() -> Self {
        Self::start(0).await
    }

    pub(crate) async fn refusing(return_code: u8) -> Self {
        Self::start(return_code).await
    }

    /// A loopback port with nothing listening on it.
    pub(crate) fn unused_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    pub(crate) fn port(&self) -> u16 {
        self.port
    }

    /// Next `(topic, payload)` received by the broker.
    pub(crate) async fn next_publish(&mut self) -> Option<(String, Vec<u8>)> {
        self.published.recv().await
    }

    async fn start(return_code: u8) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            if let Ok((stream, _)) = listener.accept().await {
                let _ = serve(stream, return_code, tx).await;
            }
        });

        TestBroker {
            port,
            published: rx,
        }
    }
}

async fn serve(
    mut stream: TcpStream,
    return_code: u8,
    tx: mpsc::UnboundedSender<(String, Vec<u8>)>,
) -> std::io::Result<()> {
    loop {
        let header = stream.read_u8().await?;
        let body = read_body(&mut stream).await?;

        match header >> 4 {
            // CONNECT
            1 => {
                stream.write_all(&[0x20, 0x02, 0x00, return_code]).await?;
                if return_code != 0 {
                    return Ok(());
                }
            }
            // PUBLISH
            3 => {
                let qos = (header >> 1) & 0x03;
                let topic_len = u16::from_be_bytes([body[0], body[1]]) as usize;
                let topic = String::from_utf8_lossy(&body[2..2 + topic_len]).into_owned();
                let mut offset = 2 + topic_len;
                if qos > 0 {
                    let pkid = [body[offset], body[offset + 1]];
                    offset += 2;
                    stream.write_all(&[0x40, 0x02, pkid[0], pkid[1]]).await?;
                }
                let _ = tx.send((topic, body[offset..].to_vec()));
            }
            // PINGREQ
            12 => stream.write_all(&[0xD0, 0x00]).await?,
            // DISCONNECT
            14 => return Ok(()),
            _ => {}
        }
    }
}

async fn read_body(stream: &mut TcpStream) -> std::io::Result<Vec<u8>> {
    let mut len = 0usize;
    let mut shift = 0;
    loop {
        let byte = stream.read_u8().await?;
        len |= ((byte & 0x7F) as usize) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    let mut body = vec![0; len];
    stream.read_exact(&mut body).await?;
    Ok(body)
}
