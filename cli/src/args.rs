use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about = "Campus Wallet CLI - inspect and reconcile student wallets")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Refresh every cached wallet balance from the provider
    SyncBalances,

    /// List all student wallets stored locally
    Wallets,

    /// Show the most recent transactions
    Transactions(LimitArgs),

    /// Show one student's wallet and transaction history
    Student(StudentArgs),

    /// Patch the status of every transaction with the given provider id
    ///
    /// Useful when a settlement webhook was missed and the payment was
    /// confirmed manually.
    SetStatus(SetStatusArgs),

    /// List the wallets the provider knows about
    ProviderWallets,

    /// Show the provider-side transaction history of a student's wallet
    History(HistoryArgs),
}

#[derive(ClapArgs, Debug)]
pub struct LimitArgs {
    /// Maximum number of transactions to show
    #[arg(short, long, default_value_t = 50)]
    pub limit: i64,
}

#[derive(ClapArgs, Debug)]
pub struct StudentArgs {
    /// Student identifier
    pub student_id: String,

    /// Maximum number of transactions to show
    #[arg(short, long, default_value_t = 50)]
    pub limit: i64,
}

#[derive(ClapArgs, Debug)]
pub struct SetStatusArgs {
    /// Provider transaction id (invoice or tracking id)
    pub transaction_id: String,

    /// New status: pending, completed or failed
    pub status: String,
}

#[derive(ClapArgs, Debug)]
pub struct HistoryArgs {
    /// Student identifier
    pub student_id: String,
}
