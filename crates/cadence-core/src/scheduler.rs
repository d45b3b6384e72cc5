//! Debounced rebuild scheduling.
//!
//! Every debounced request bumps a generation counter and arms a timer; when
//! the timer fires it only runs the rebuild if no later request arrived in
//! the meantime. Immediate requests run the rebuild on the caller's thread
//! and leave any armed timer alone, so an immediate and a debounced rebuild
//! may run back to back.

use std::sync::atomic::{ AtomicU64, Ordering };
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;


/// Work run by the scheduler.
pub type RebuildAction = Arc<dyn Fn() + Send + Sync>;


/// Coalesces bursts of rebuild requests into a single rebuild.
pub struct RebuildScheduler {
    runtime: Handle,
    window: Duration,
    generation: Arc<AtomicU64>,
    action: RebuildAction,
}


impl RebuildScheduler {
    /// @param runtime runtime the debounce timers are spawned on
    /// @param window quiet period before a debounced rebuild fires
    /// @param action the rebuild itself; runs on a blocking thread when debounced
    pub fn new( runtime: Handle, window: Duration, action: RebuildAction ) -> Self {
        Self {
            runtime,
            window,
            generation: Arc::new( AtomicU64::new( 0 ) ),
            action,
        }
    }


    /// Requests a rebuild.
    ///
    /// With `immediate` the action runs before this returns. Otherwise the
    /// quiet window restarts and only the last request of the burst fires.
    pub fn schedule( &self, immediate: bool ) {
        if immediate {
            tracing::debug!( "Running immediate rebuild" );
            ( self.action )();
            return;
        }

        let generation = self.generation.fetch_add( 1, Ordering::SeqCst ) + 1;
        let latest = Arc::clone( &self.generation );
        let action = Arc::clone( &self.action );
        let window = self.window;

        self.runtime.spawn( async move {
            tokio::time::sleep( window ).await;

            if latest.load( Ordering::SeqCst ) != generation {
                return;
            }

            if let Err( e ) = tokio::task::spawn_blocking( move || action() ).await {
                tracing::error!( "Rebuild task failed: {}", e );
            }
        });
    }


    /// Drops any pending debounced rebuild.
    pub fn cancel( &self ) {
        self.generation.fetch_add( 1, Ordering::SeqCst );
    }


    pub fn window( &self ) -> Duration {
        self.window
    }
}


impl Drop for RebuildScheduler {
    fn drop( &mut self ) {
        self.cancel();
    }
}


#[cfg( test )]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;


    fn counting_scheduler( window: Duration ) -> ( RebuildScheduler, Arc<AtomicUsize> ) {
        let count = Arc::new( AtomicUsize::new( 0 ) );
        let counter = Arc::clone( &count );
        let action: RebuildAction = Arc::new( move || {
            counter.fetch_add( 1, Ordering::SeqCst );
        });

        ( RebuildScheduler::new( Handle::current(), window, action ), count )
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_burst_fires_once() {
        let ( scheduler, count ) = counting_scheduler( Duration::from_millis( 50 ) );

        for _ in 0..10 {
            scheduler.schedule( false );
        }
        assert_eq!( count.load( Ordering::SeqCst ), 0 );

        tokio::time::sleep( Duration::from_millis( 300 ) ).await;
        assert_eq!( count.load( Ordering::SeqCst ), 1 );
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_each_quiet_window_fires() {
        let ( scheduler, count ) = counting_scheduler( Duration::from_millis( 30 ) );

        scheduler.schedule( false );
        tokio::time::sleep( Duration::from_millis( 200 ) ).await;
        scheduler.schedule( false );
        tokio::time::sleep( Duration::from_millis( 200 ) ).await;

        assert_eq!( count.load( Ordering::SeqCst ), 2 );
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_immediate_runs_now_and_keeps_pending_timer() {
        let ( scheduler, count ) = counting_scheduler( Duration::from_millis( 50 ) );

        scheduler.schedule( false );
        scheduler.schedule( true );
        assert_eq!( count.load( Ordering::SeqCst ), 1 );

        tokio::time::sleep( Duration::from_millis( 300 ) ).await;
        assert_eq!( count.load( Ordering::SeqCst ), 2 );
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_drop_cancels_pending() {
        let ( scheduler, count ) = counting_scheduler( Duration::from_millis( 50 ) );

        scheduler.schedule( false );
        drop( scheduler );

        tokio::time::sleep( Duration::from_millis( 300 ) ).await;
        assert_eq!( count.load( Ordering::SeqCst ), 0 );
    }
}
