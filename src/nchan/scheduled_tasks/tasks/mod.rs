mod channel_resync;

pub(crate) use channel_resync::ChannelResync;
