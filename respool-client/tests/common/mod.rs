//! In-process RESP server used by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use respool_client::{ConnectionConfig, PoolConfig};

/// Reply bytes to send back, or `None` to drop the connection.
pub type Reply = Option<Vec<u8>>;

pub struct MockServer {
    pub port: u16,
    accepted: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MockServer {
    pub fn pool_config(&self, pool_size: usize) -> PoolConfig {
        let mut connection = ConnectionConfig::new("127.0.0.1", self.port);
        connection.connect_timeout_ms = Some(1_000);
        PoolConfig::new(connection, pool_size)
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Waits until the server has accepted `count` connections.
    pub fn wait_accepted(&self, count: usize) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if self.accepted() >= count {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    /// Raw bytes of every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<Vec<u8>> {
        self.requests.lock().unwrap().clone()
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Starts a server that answers every command with `handler`.
pub fn spawn_server<F>(handler: F) -> MockServer
where
    F: Fn(&[Vec<u8>]) -> Reply + Send + Sync + 'static,
{
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let accepted = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(handler);

    {
        let accepted = accepted.clone();
        let requests = requests.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                accepted.fetch_add(1, Ordering::SeqCst);
                let requests = requests.clone();
                let handler = handler.clone();
                thread::spawn(move || serve(stream, requests, handler.as_ref()));
            }
        });
    }

    MockServer {
        port,
        accepted,
        requests,
    }
}

/// Starts a server backed by a small in-memory store.
pub fn spawn_kv_server() -> MockServer {
    let store = Mutex::new(Store::default());
    spawn_server(move |args| Some(store.lock().unwrap().apply(args)))
}

fn serve<F>(mut stream: TcpStream, requests: Arc<Mutex<Vec<Vec<u8>>>>, handler: &F)
where
    F: Fn(&[Vec<u8>]) -> Reply + ?Sized,
{
    let mut reader = BufReader::new(stream.try_clone().expect("clone"));
    loop {
        let Ok(Some((args, raw))) = read_command(&mut reader) else {
            return;
        };
        requests.lock().unwrap().push(raw);
        match handler(&args) {
            Some(reply) => {
                if stream.write_all(&reply).is_err() {
                    return;
                }
            }
            None => {
                let _ = stream.shutdown(std::net::Shutdown::Both);
                return;
            }
        }
    }
}

type Command = (Vec<Vec<u8>>, Vec<u8>);

fn read_command(reader: &mut BufReader<TcpStream>) -> std::io::Result<Option<Command>> {
    let mut raw = Vec::new();
    let Some(line) = read_line(reader, &mut raw)? else {
        return Ok(None);
    };
    if line.first() != Some(&b'*') {
        return Err(invalid("expected array"));
    }
    let count = parse_int(&line[1..])?;
    let mut args = Vec::new();
    for _ in 0..count {
        let line = read_line(reader, &mut raw)?.ok_or_else(|| invalid("eof"))?;
        if line.first() != Some(&b'$') {
            return Err(invalid("expected bulk"));
        }
        let len = parse_int(&line[1..])?;
        if len < 0 {
            args.push(Vec::new());
            continue;
        }
        let mut data = vec![0u8; len as usize + 2];
        reader.read_exact(&mut data)?;
        raw.extend_from_slice(&data);
        data.truncate(len as usize);
        args.push(data);
    }
    Ok(Some((args, raw)))
}

fn read_line(reader: &mut BufReader<TcpStream>, raw: &mut Vec<u8>) -> std::io::Result<Option<Vec<u8>>> {
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf)? == 0 {
        return Ok(None);
    }
    raw.extend_from_slice(&buf);
    if buf.len() < 2 || buf[buf.len() - 2] != b'\r' {
        return Err(invalid("invalid line"));
    }
    buf.truncate(buf.len() - 2);
    Ok(Some(buf))
}

fn parse_int(data: &[u8]) -> std::io::Result<i64> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| invalid("bad integer"))
}

fn invalid(msg: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, msg.to_string())
}

pub fn simple(msg: &str) -> Reply {
    Some(format!("+{}\r\n", msg).into_bytes())
}

pub fn error(msg: &str) -> Reply {
    Some(format!("-{}\r\n", msg).into_bytes())
}

pub fn integer(value: i64) -> Reply {
    Some(format!(":{}\r\n", value).into_bytes())
}

pub fn bulk(data: &[u8]) -> Reply {
    let mut out = format!("${}\r\n", data.len()).into_bytes();
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
    Some(out)
}

pub fn nil() -> Reply {
    Some(b"$-1\r\n".to_vec())
}

pub fn array<T: AsRef<[u8]>>(items: &[T]) -> Reply {
    let mut out = format!("*{}\r\n", items.len()).into_bytes();
    for item in items {
        out.extend(bulk(item.as_ref()).unwrap_or_default());
    }
    Some(out)
}

/// Just enough of a key/value server for the reply shapes under test.
#[derive(Default)]
struct Store {
    strings: HashMap<Vec<u8>, Vec<u8>>,
    lists: HashMap<Vec<u8>, Vec<Vec<u8>>>,
    hashes: HashMap<Vec<u8>, Vec<(Vec<u8>, Vec<u8>)>>,
}

impl Store {
    fn apply(&mut self, args: &[Vec<u8>]) -> Vec<u8> {
        let name = args
            .first()
            .map(|cmd| String::from_utf8_lossy(cmd).to_ascii_uppercase())
            .unwrap_or_default();
        let reply = match (name.as_str(), &args[1.min(args.len())..]) {
            ("PING", []) => simple("PONG"),
            ("SET", [key, value]) => {
                self.strings.insert(key.clone(), value.clone());
                simple("OK")
            }
            ("GET", [key]) => match self.strings.get(key) {
                Some(value) => bulk(value),
                None => nil(),
            },
            ("DEL", keys) => {
                let mut removed = 0;
                for key in keys {
                    let hit = self.strings.remove(key).is_some()
                        | self.lists.remove(key).is_some()
                        | self.hashes.remove(key).is_some();
                    removed += hit as i64;
                }
                integer(removed)
            }
            ("LPUSH", [key, values @ ..]) if !values.is_empty() => {
                let list = self.lists.entry(key.clone()).or_default();
                for value in values {
                    list.insert(0, value.clone());
                }
                integer(list.len() as i64)
            }
            ("LRANGE", [key, _, _]) => array(self.lists.get(key).map(Vec::as_slice).unwrap_or(&[])),
            ("HMSET", [key, pairs @ ..]) if !pairs.is_empty() && pairs.len() % 2 == 0 => {
                let hash = self.hashes.entry(key.clone()).or_default();
                for pair in pairs.chunks(2) {
                    match hash.iter().position(|(field, _)| *field == pair[0]) {
                        Some(idx) => hash[idx].1 = pair[1].clone(),
                        None => hash.push((pair[0].clone(), pair[1].clone())),
                    }
                }
                simple("OK")
            }
            ("HGETALL", [key]) => {
                let flat: Vec<Vec<u8>> = self
                    .hashes
                    .get(key)
                    .into_iter()
                    .flatten()
                    .flat_map(|(field, value)| [field.clone(), value.clone()])
                    .collect();
                array(&flat)
            }
            ("SELECT", [db]) => match parse_int(db) {
                Ok(0..=15) => simple("OK"),
                _ => error("ERR DB index is out of range"),
            },
            _ => error(&format!("ERR unknown command '{}'", name.to_ascii_lowercase())),
        };
        reply.unwrap_or_default()
    }
}
