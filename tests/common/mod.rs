#![allow(dead_code)]

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server};
use std::convert::Infallible;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Request head as seen by a test upstream
#[derive(Debug, Clone)]
pub struct Recorded {
    pub uri: String,
    pub host: Option<String>,
    pub proxy_target: Option<String>,
}

pub type Recorder = Arc<Mutex<Vec<Recorded>>>;

/// Upstream that records every request and answers with the request path as body
pub fn spawn_echo_upstream() -> (SocketAddr, Recorder) {
    let recorder: Recorder = Arc::new(Mutex::new(Vec::new()));
    let recorder_clone = Arc::clone(&recorder);

    let make_svc = make_service_fn(move |_conn| {
        let recorder = Arc::clone(&recorder_clone);
        async move {
            Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                let recorder = Arc::clone(&recorder);
                async move {
                    let header = |name: &str| {
                        req.headers()
                            .get(name)
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string)
                    };
                    recorder.lock().unwrap().push(Recorded {
                        uri: req.uri().to_string(),
                        host: header("host"),
                        proxy_target: header("x-proxy-target"),
                    });
                    let path = req.uri().path().to_string();
                    Ok::<_, Infallible>(Response::new(Body::from(path)))
                }
            }))
        }
    });

    let server = Server::bind(&"127.0.0.1:0".parse().unwrap()).serve(make_svc);
    let addr = server.local_addr();
    tokio::spawn(server);
    (addr, recorder)
}

/// TCP listener that accepts connections and never writes a byte
pub async fn spawn_silent_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// Minimal SOCKS5 server.
///
/// Accepts username/password auth when offered, recording it as `auth user:pass`, then
/// records each CONNECT destination and tunnels every connection to `forward_to`,
/// whatever destination the client asked for.
pub async fn spawn_socks5(forward_to: SocketAddr) -> (SocketAddr, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let destinations = Arc::new(Mutex::new(Vec::new()));
    let destinations_clone = Arc::clone(&destinations);

    tokio::spawn(async move {
        while let Ok((inbound, _)) = listener.accept().await {
            let destinations = Arc::clone(&destinations_clone);
            tokio::spawn(async move {
                let _ = tunnel(inbound, forward_to, destinations).await;
            });
        }
    });

    (addr, destinations)
}

async fn tunnel(
    mut inbound: TcpStream,
    forward_to: SocketAddr,
    destinations: Arc<Mutex<Vec<String>>>,
) -> std::io::Result<()> {
    let mut greeting = [0u8; 2];
    inbound.read_exact(&mut greeting).await?;
    let mut methods = vec![0u8; greeting[1] as usize];
    inbound.read_exact(&mut methods).await?;
    if methods.contains(&0x02) {
        inbound.write_all(&[0x05, 0x02]).await?;
        let username = read_auth_field(&mut inbound, true).await?;
        let password = read_auth_field(&mut inbound, false).await?;
        destinations
            .lock()
            .unwrap()
            .push(format!("auth {}:{}", username, password));
        inbound.write_all(&[0x01, 0x00]).await?;
    } else {
        inbound.write_all(&[0x05, 0x00]).await?;
    }

    let mut head = [0u8; 4];
    inbound.read_exact(&mut head).await?;
    let host = match head[3] {
        0x01 => {
            let mut ip = [0u8; 4];
            inbound.read_exact(&mut ip).await?;
            Ipv4Addr::from(ip).to_string()
        }
        0x03 => {
            let mut len = [0u8; 1];
            inbound.read_exact(&mut len).await?;
            let mut name = vec![0u8; len[0] as usize];
            inbound.read_exact(&mut name).await?;
            String::from_utf8_lossy(&name).into_owned()
        }
        _ => {
            let mut ip = [0u8; 16];
            inbound.read_exact(&mut ip).await?;
            format!("[{}]", Ipv6Addr::from(ip))
        }
    };
    let mut port = [0u8; 2];
    inbound.read_exact(&mut port).await?;
    destinations
        .lock()
        .unwrap()
        .push(format!("{}:{}", host, u16::from_be_bytes(port)));

    let mut outbound = TcpStream::connect(forward_to).await?;
    inbound
        .write_all(&[0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0])
        .await?;
    tokio::io::copy_bidirectional(&mut inbound, &mut outbound).await?;
    Ok(())
}

/// Read one RFC 1929 field; the first one is preceded by the sub-negotiation version
async fn read_auth_field(inbound: &mut TcpStream, with_version: bool) -> std::io::Result<String> {
    if with_version {
        let mut version = [0u8; 1];
        inbound.read_exact(&mut version).await?;
    }
    let mut len = [0u8; 1];
    inbound.read_exact(&mut len).await?;
    let mut field = vec![0u8; len[0] as usize];
    inbound.read_exact(&mut field).await?;
    Ok(String::from_utf8_lossy(&field).into_owned())
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("host", "anything.example")
        .body(Body::empty())
        .unwrap()
}
