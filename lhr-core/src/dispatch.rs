//! Table-driven channel dispatch.
//!
//! Channel names are hierarchical: each character selects one level of the
//! handler tree. A handler owns one node and routes its children through an
//! ordered table of `(character, handler)` pairs. The first matching entry
//! wins and an unmatched character is ignored without a reply.

use lhr_proto::Message;

use crate::messager::Messager;

/// A received message together with how far its channel has been consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    message: Message,
    depth: usize,
}

impl Request {
    pub fn new(message: Message) -> Self {
        Self { message, depth: 0 }
    }

    /// Channel character at the current level, or `None` at the addressed node.
    #[inline]
    pub fn key(&self) -> Option<u8> {
        self.message.key(self.depth)
    }

    /// Whether the whole channel has been consumed.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.key().is_none()
    }

    /// The same request one level further down the channel.
    #[must_use]
    pub fn descend(&self) -> Self {
        Self {
            message: self.message.clone(),
            depth: self.depth + 1,
        }
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    pub fn payload(&self) -> Option<i32> {
        self.message.payload
    }

    #[inline]
    pub fn channel(&self) -> &str {
        self.message.channel()
    }

    /// Remaining, not yet consumed part of the channel.
    pub fn rest(&self) -> &str {
        self.message.channel().get(self.depth..).unwrap_or("")
    }
}

/// Handler for one node of the channel tree.
pub type Handler<S, T> = fn(&mut S, &mut Messager<T>, &Request);

/// One entry of a routing table.
pub type Route<S, T> = (u8, Handler<S, T>);

/// Route `request` by its current key. Returns whether a handler ran.
pub fn dispatch<S, T>(
    routes: &[Route<S, T>],
    target: &mut S,
    messager: &mut Messager<T>,
    request: &Request,
) -> bool {
    let Some(key) = request.key() else {
        return false;
    };
    match routes.iter().find(|(c, _)| *c == key) {
        Some((_, handler)) => {
            handler(target, messager, &request.descend());
            true
        }
        None => {
            trace!("no handler for '{}' in channel '{}'", key as char, request.channel());
            false
        }
    }
}

/// Answer a numeric parameter node: apply the payload through `set` if one was
/// given, then reply with the value read back through `get`.
///
/// `set` may refuse the write; the unchanged value is echoed in that case so
/// the caller sees the rejection.
pub fn parameter<S, T, G, W>(
    target: &mut S,
    messager: &mut Messager<T>,
    request: &Request,
    get: G,
    set: W,
) where
    T: lhr_proto::Transport,
    G: Fn(&S) -> i32,
    W: FnOnce(&mut S, i32) -> bool,
{
    if !request.is_leaf() {
        return;
    }
    if let Some(value) = request.payload() {
        if !set(target, value) {
            debug!("rejected {} on channel '{}'", value, request.channel());
        }
    }
    messager.send_response(get(target));
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::messager::mock::MockTransport;
    use std::vec::Vec;

    #[derive(Default)]
    struct Tree {
        visited: Vec<&'static str>,
        limit: i32,
    }

    fn on_a(tree: &mut Tree, messager: &mut Messager<MockTransport>, request: &Request) {
        tree.visited.push("a");
        let routes: [Route<Tree, MockTransport>; 2] = [(b'b', on_ab), (b'b', on_ab_shadowed)];
        dispatch(&routes, tree, messager, request);
    }

    fn on_ab(tree: &mut Tree, _: &mut Messager<MockTransport>, request: &Request) {
        assert!(request.is_leaf());
        tree.visited.push("ab");
    }

    fn on_ab_shadowed(tree: &mut Tree, _: &mut Messager<MockTransport>, _: &Request) {
        tree.visited.push("shadowed");
    }

    fn on_limit(tree: &mut Tree, messager: &mut Messager<MockTransport>, request: &Request) {
        parameter(
            tree,
            messager,
            request,
            |t| t.limit,
            |t, v| {
                if v < 0 {
                    return false;
                }
                t.limit = v;
                true
            },
        );
    }

    fn request(channel: &str, payload: Option<i32>) -> Request {
        Request::new(Message::new(channel, payload).unwrap())
    }

    #[test]
    fn test_first_match_wins() {
        let mut tree = Tree::default();
        let mut messager = Messager::new(MockTransport::default());
        let routes: [Route<Tree, MockTransport>; 1] = [(b'a', on_a)];
        assert!(dispatch(&routes, &mut tree, &mut messager, &request("ab", None)));
        assert_eq!(tree.visited, ["a", "ab"]);
    }

    #[test]
    fn test_unmatched_is_ignored() {
        let mut tree = Tree::default();
        let mut messager = Messager::new(MockTransport::default());
        let routes: [Route<Tree, MockTransport>; 1] = [(b'a', on_a)];
        assert!(!dispatch(&routes, &mut tree, &mut messager, &request("q", None)));
        assert!(dispatch(&routes, &mut tree, &mut messager, &request("az", None)));
        assert_eq!(tree.visited, ["a"]);
        assert!(messager.transport_mut().take_lines().is_empty());
    }

    #[test]
    fn test_request_depth() {
        let r = request("pflmfh", Some(1));
        assert_eq!(r.key(), Some(b'p'));
        let r = r.descend().descend();
        assert_eq!(r.depth(), 2);
        assert_eq!(r.key(), Some(b'l'));
        assert_eq!(r.rest(), "lmfh");
        assert!(!r.is_leaf());
    }

    #[test]
    fn test_parameter_echoes_after_rejection() {
        let mut tree = Tree {
            limit: 7,
            ..Tree::default()
        };
        let mut messager = Messager::new(MockTransport::default());
        messager.transport_mut().push("<x>(-3)");
        messager.update();
        let received = request("x", Some(-3));
        on_limit(&mut tree, &mut messager, &received);
        assert_eq!(tree.limit, 7);

        let received = request("x", Some(12));
        on_limit(&mut tree, &mut messager, &received);
        assert_eq!(tree.limit, 12);
        assert_eq!(messager.transport_mut().take_lines(), ["<x>(7)", "<x>(12)"]);
    }
}
