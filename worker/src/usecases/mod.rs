pub mod subscription_commitments;
