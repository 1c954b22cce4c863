//! Integration tests for the in-process channel connection.

#[cfg(feature = "channel")]
mod channel {
    use tether_transport::{BufferPool, ChannelConnection, Connection, TransportError};

    #[test]
    fn test_pair_delivers_in_send_order() {
        let pool = BufferPool::default();
        let (mut a, mut b) = ChannelConnection::pair();

        for i in 0..5u8 {
            a.send(pool.rent_copy(&[i])).expect("send should succeed");
        }

        let mut seen = Vec::new();
        while let Some(msg) = b.receive().expect("receive should succeed") {
            seen.push(msg.as_slice()[0]);
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_receive_returns_none_when_idle() {
        let (_a, mut b) = ChannelConnection::pair();
        assert!(b.receive().unwrap().is_none());
    }

    #[test]
    fn test_pair_is_bidirectional() {
        let pool = BufferPool::default();
        let (mut a, mut b) = ChannelConnection::pair();
        a.send(pool.rent_copy(b"ping")).unwrap();
        b.send(pool.rent_copy(b"pong")).unwrap();
        assert_eq!(b.receive().unwrap().unwrap().as_slice(), b"ping");
        assert_eq!(a.receive().unwrap().unwrap().as_slice(), b"pong");
    }

    #[test]
    fn test_buffer_is_shared_not_copied() {
        let pool = BufferPool::default();
        let (mut a, mut b) = ChannelConnection::pair();
        let msg = pool.rent_copy(b"abc");
        a.send(msg.acquire()).unwrap();
        assert_eq!(msg.ref_count(), 2, "the pipe holds the second reference");

        let received = b.receive().unwrap().unwrap();
        drop(msg);
        assert_eq!(received.ref_count(), 1);
        received.release();
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let (mut a, _b) = ChannelConnection::pair();
        a.dispose().unwrap();
        a.dispose().unwrap();
        assert!(a.is_disposed());
    }

    #[test]
    fn test_send_after_dispose_fails() {
        let pool = BufferPool::default();
        let (mut a, _b) = ChannelConnection::pair();
        a.dispose().unwrap();
        let err = a.send(pool.rent(1)).unwrap_err();
        assert!(matches!(err, TransportError::Disposed(_)));
    }

    #[test]
    fn test_send_to_dropped_peer_releases_buffer() {
        let pool = BufferPool::default();
        let (mut a, b) = ChannelConnection::pair();
        drop(b);
        let err = a.send(pool.rent(4)).unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed(_)));
        drop(err);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_receive_after_remote_dispose_drains_then_idles() {
        let pool = BufferPool::default();
        let (mut a, mut b) = ChannelConnection::pair();
        a.send(pool.rent_copy(b"last")).unwrap();
        a.dispose().unwrap();
        assert_eq!(b.receive().unwrap().unwrap().as_slice(), b"last");
        assert!(b.receive().unwrap().is_none());
    }
}
