pub type SessionId = u64;
