use std::{collections::HashMap, net::SocketAddr};

use smol::channel::{self, Receiver, Sender, TryRecvError};

use super::{RecvError, SendError, Socket, TransportEvent};

type Link = (SocketAddr, Sender<Box<[u8]>>);

/// In-memory [`Socket`] built on unbounded channels. Peers connect through
/// a [`ChannelConnector`], which can be cloned and handed to other threads.
pub struct ChannelSocket {
    events_sender: Sender<TransportEvent>,
    events: Receiver<TransportEvent>,
    links: Receiver<Link>,
    peers: HashMap<SocketAddr, Sender<Box<[u8]>>>,
}

impl ChannelSocket {
    pub fn unbounded() -> (Self, ChannelConnector) {
        let (events_sender, events) = channel::unbounded();
        let (links_sender, links) = channel::unbounded();

        let socket = Self {
            events_sender: events_sender.clone(),
            events,
            links,
            peers: HashMap::new(),
        };
        let connector = ChannelConnector {
            events: events_sender,
            links: links_sender,
        };

        (socket, connector)
    }

    fn accept_links(&mut self) {
        while let Ok((address, sender)) = self.links.try_recv() {
            self.peers.insert(address, sender);
        }
    }
}

impl Socket for ChannelSocket {
    fn receive(&mut self) -> Result<Option<TransportEvent>, RecvError> {
        self.accept_links();

        match self.events.try_recv() {
            Ok(TransportEvent::Disconnected(address)) => {
                self.peers.remove(&address);
                Ok(Some(TransportEvent::Disconnected(address)))
            }
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Closed) => Err(RecvError),
        }
    }

    fn send(&mut self, address: &SocketAddr, payload: &[u8]) -> Result<(), SendError> {
        let Some(sender) = self.peers.get(address) else {
            return Err(SendError);
        };
        sender.try_send(payload.into()).map_err(|_| SendError)
    }

    fn terminate(&mut self, address: &SocketAddr) {
        if self.peers.remove(address).is_some() {
            // the socket holds a sender itself, so this cannot fail
            let _ = self
                .events_sender
                .try_send(TransportEvent::Disconnected(*address));
        }
    }
}

/// Opens connections to a [`ChannelSocket`]
#[derive(Clone)]
pub struct ChannelConnector {
    events: Sender<TransportEvent>,
    links: Sender<Link>,
}

impl ChannelConnector {
    pub fn connect(&self, address: SocketAddr) -> Result<ChannelClient, SendError> {
        let (sender, inbox) = channel::unbounded();
        self.links
            .try_send((address, sender))
            .map_err(|_| SendError)?;
        self.events
            .try_send(TransportEvent::Connected(address))
            .map_err(|_| SendError)?;

        Ok(ChannelClient {
            address,
            events: self.events.clone(),
            inbox,
        })
    }
}

/// The peer end of one [`ChannelSocket`] connection
pub struct ChannelClient {
    address: SocketAddr,
    events: Sender<TransportEvent>,
    inbox: Receiver<Box<[u8]>>,
}

impl ChannelClient {
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn send(&self, payload: &[u8]) -> Result<(), SendError> {
        self.events
            .try_send(TransportEvent::Packet(self.address, payload.into()))
            .map_err(|_| SendError)
    }

    /// Polls for the next packet from the server. Fails once the server has
    /// terminated this connection and every packet sent before that has
    /// been read.
    pub fn receive(&self) -> Result<Option<Box<[u8]>>, RecvError> {
        match self.inbox.try_recv() {
            Ok(payload) => Ok(Some(payload)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Closed) => Err(RecvError),
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.inbox.is_closed() && self.inbox.is_empty()
    }

    /// Closes the connection from the peer side
    pub fn disconnect(self) {
        let _ = self
            .events
            .try_send(TransportEvent::Disconnected(self.address));
    }
}
