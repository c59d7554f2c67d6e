#![allow(dead_code)]

use noderelay::types::{Node, Protocol, Token};

/// Builder for [`Token`] to simplify test setup.
pub struct TokenBuilder {
    token: Token,
}

impl TokenBuilder {
    pub fn new(id: &str, kind: Protocol) -> Self {
        Self {
            token: Token {
                id: id.to_string(),
                kind,
                node: "AP01m".to_string(),
                ip: "192.168.0.11".to_string(),
                port: 23,
                transport: "telnet".to_string(),
            },
        }
    }

    pub fn node(mut self, name: &str) -> Self {
        self.token.node = name.to_string();
        self
    }

    pub fn ip(mut self, ip: &str) -> Self {
        self.token.ip = ip.to_string();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.token.port = port;
        self
    }

    pub fn transport(mut self, transport: &str) -> Self {
        self.token.transport = transport.to_string();
        self
    }

    pub fn build(self) -> Token {
        self.token
    }
}

/// Builder for [`Node`].
pub struct NodeBuilder {
    node: Node,
}

impl NodeBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            node: Node {
                name: name.to_string(),
                ip: "192.168.0.11".to_string(),
                tokens: Vec::new(),
            },
        }
    }

    pub fn ip(mut self, ip: &str) -> Self {
        self.node.ip = ip.to_string();
        self
    }

    /// An empty ip marks the node (and its tokens) as awaiting discovery.
    pub fn without_ip(mut self) -> Self {
        self.node.ip = String::new();
        self
    }

    pub fn with_token(mut self, id: &str, kind: Protocol) -> Self {
        self.node.tokens.push(
            TokenBuilder::new(id, kind)
                .node(&self.node.name)
                .ip(&self.node.ip)
                .build(),
        );
        self
    }

    pub fn build(self) -> Node {
        self.node
    }
}
