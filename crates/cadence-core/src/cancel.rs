//! Cooperative cancellation for scans.

use std::sync::Arc;
use std::sync::atomic::{ AtomicBool, Ordering };


/// Shared cancellation flag, threaded through file enumeration.
///
/// Clones observe the same flag.
#[derive( Debug, Clone, Default )]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}


impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }


    /// Requests cancellation of every operation holding this token.
    pub fn cancel( &self ) {
        self.flag.store( true, Ordering::Relaxed );
    }


    pub fn is_cancelled( &self ) -> bool {
        self.flag.load( Ordering::Relaxed )
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_clones_share_flag() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!( !clone.is_cancelled() );

        token.cancel();
        assert!( clone.is_cancelled() );
    }
}
