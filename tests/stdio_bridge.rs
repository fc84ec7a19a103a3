mod common;

use std::collections::HashMap;

use anyhow::{Context, Result};
use common::*;
use serde_json::{Value, json};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf},
    task::JoinHandle,
};
use wallet_hub::{ChainFamily, ProviderId, WalletHub, layers::stdio::StdioServer};

/// In-memory client talking to a bridge served on a background task.
struct Client {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
    server: JoinHandle<wallet_hub::AppResult<()>>,
}

impl Client {
    fn start(hub: WalletHub) -> Self {
        let (client, server_end) = tokio::io::duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server_end);
        let server = tokio::spawn(async move {
            StdioServer::new(hub)
                .serve(BufReader::new(server_read), server_write)
                .await
        });
        let (read, writer) = tokio::io::split(client);
        Self {
            lines: BufReader::new(read).lines(),
            writer,
            server,
        }
    }

    async fn send_raw(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn send(&mut self, id: u64, method: &str, params: Value) -> Result<()> {
        let request = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
        self.send_raw(&request.to_string()).await
    }

    async fn next_response(&mut self) -> Result<Value> {
        let line = self.lines.next_line().await?.context("bridge closed")?;
        Ok(serde_json::from_str(&line)?)
    }

    async fn call(&mut self, id: u64, method: &str, params: Value) -> Result<Value> {
        self.send(id, method, params).await?;
        let response = self.next_response().await?;
        assert_eq!(response["id"], id);
        Ok(response)
    }

    async fn close(self) -> Result<()> {
        let Client {
            lines,
            mut writer,
            server,
        } = self;
        writer.shutdown().await?;
        drop(lines);
        drop(writer);
        server.await??;
        Ok(())
    }
}

#[tokio::test]
async fn select_connect_and_sign_over_stdio() -> Result<()> {
    let phantom = MockWallet::new("7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU");
    let h = harness(
        vec![entry(info("Phantom", ProviderId::Phantom, ChainFamily::Solana), phantom)],
        desktop_extension(),
    );
    let mut client = Client::start(h.hub.clone());

    let wallets = client.call(1, "list_wallets", Value::Null).await?;
    assert_eq!(wallets["result"][0]["name"], "Phantom");
    assert_eq!(wallets["result"][0]["ready_state"], "Installed");

    let selected = client.call(2, "select_wallet", json!({"name": "Phantom"})).await?;
    assert_eq!(selected["result"]["chain_family"], "solana");

    let connected = client.call(3, "connect", Value::Null).await?;
    assert_eq!(connected["result"]["outcome"], "connected");

    // the mock signs by reversing the message
    let signed = client.call(4, "sign_message", json!({"message_hex": "0x010203"})).await?;
    assert_eq!(signed["result"]["signature_hex"], "030201");

    let session = client.call(5, "session", Value::Null).await?;
    assert_eq!(session["result"]["session"]["status"], "connected");
    assert_eq!(session["result"]["shortened_account_id"], "7xKX..gAsU");
    assert_eq!(session["result"]["environment"], "desktop-dapp-browser");

    client.close().await
}

#[tokio::test]
async fn reselection_is_served_while_connect_is_pending() -> Result<()> {
    let phantom = MockWallet::new("7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU");
    let metamask = MockWallet::new("0x90F8bf6A479f320ead074411a4B0e7944Ea8c9C1");
    let gate = phantom.gate_connect();
    let h = harness(
        vec![
            entry(info("Phantom", ProviderId::Phantom, ChainFamily::Solana), phantom),
            entry(info("MetaMask", ProviderId::MetaMask, ChainFamily::Evm), metamask),
        ],
        desktop_extension(),
    );
    let mut client = Client::start(h.hub.clone());

    client.call(1, "select_wallet", json!({"name": "Phantom"})).await?;
    client.send(2, "connect", Value::Null).await?;
    h.hub.subscribe().wait_for(wallet_hub::Session::is_connecting).await?;

    let reselected = client.call(3, "select_wallet", json!({"name": "MetaMask"})).await?;
    assert_eq!(reselected["result"]["name"], "MetaMask");

    let _ = gate.send(());
    let connect = client.next_response().await?;
    assert_eq!(connect["id"], 2);
    assert_eq!(connect["result"]["outcome"], "superseded");

    let session = client.call(4, "session", Value::Null).await?;
    assert_eq!(session["result"]["session"]["active_wallet"]["name"], "MetaMask");
    assert_eq!(session["result"]["session"]["status"], "selected");

    client.close().await
}

#[tokio::test]
async fn errors_are_reported_per_request() -> Result<()> {
    let h = harness(
        vec![entry(
            info("Phantom", ProviderId::Phantom, ChainFamily::Solana),
            MockWallet::new("7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU"),
        )],
        desktop_extension(),
    );
    let server = StdioServer::new(h.hub);

    let mut input = b"{not json}\n".to_vec();
    for request in [
        json!({"jsonrpc": "2.0", "id": 1, "method": "connect"}),
        json!({"jsonrpc": "2.0", "id": 2, "method": "select_wallet", "params": {}}),
        json!({"jsonrpc": "2.0", "id": 3, "method": "teleport"}),
    ] {
        input.extend_from_slice(request.to_string().as_bytes());
        input.push(b'\n');
    }
    let mut output = Vec::new();
    server.serve(input.as_slice(), &mut output).await?;

    let by_id: HashMap<String, Value> = String::from_utf8(output)?
        .lines()
        .map(|line| -> Result<(String, Value)> {
            let response: Value = serde_json::from_str(line)?;
            Ok((response["id"].to_string(), response))
        })
        .collect::<Result<_>>()?;

    assert_eq!(by_id.len(), 4);
    assert_eq!(by_id["null"]["error"]["code"], -32700);
    assert!(
        by_id["1"]["error"]["message"]
            .as_str()
            .unwrap()
            .contains("no wallet selected")
    );
    assert_eq!(by_id["2"]["error"]["code"], -32602);
    assert_eq!(by_id["3"]["error"]["code"], -32601);
    Ok(())
}
